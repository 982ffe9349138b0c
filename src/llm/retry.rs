// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry logic for streaming requests with exponential backoff

use crate::config::settings::ResilienceConfig;
use crate::error::{ApiError, ChatError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay in milliseconds (exponentially increased)
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Jitter percentage (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry that follows `retry_count` earlier retries.
    ///
    /// `base * 2^retry_count`, capped at `max_delay_ms`, then jittered.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry_count);
        let capped_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        let jitter_range = (capped_ms as f64 * self.jitter) as i64;
        if jitter_range == 0 {
            return Duration::from_millis(capped_ms);
        }

        let jitter_ms = rand::rng().random_range(-jitter_range..=jitter_range);
        let final_ms = (capped_ms as i64 + jitter_ms).max(0) as u64;
        Duration::from_millis(final_ms)
    }
}

/// Determine if an error is worth another attempt
pub fn is_retryable(error: &ChatError) -> bool {
    match error {
        ChatError::Api(api_error) => match api_error {
            ApiError::Network(_) => true,
            ApiError::RateLimited(_) => true,
            ApiError::Timeout => true,
            ApiError::ServerError { .. } => true,
            ApiError::StreamError(_) => true,

            ApiError::AuthenticationFailed => false,
            ApiError::InvalidResponse(_) => false,
        },
        ChatError::Http(_) => true,
        _ => false,
    }
}

/// A retry that is about to wait out its backoff
#[derive(Debug)]
pub struct RetryNotice<'a> {
    /// 1-based number of the retry being scheduled
    pub attempt: u32,
    /// Backoff before the retry starts
    pub delay: Duration,
    /// Failure that triggered it
    pub error: &'a ChatError,
}

/// Run `operation` until it succeeds, fails for good, or is cancelled.
///
/// `operation` receives the number of retries made so far. `on_retry` runs
/// before each backoff wait. Cancellation during the wait returns
/// `ChatError::Cancelled` and is never retried.
pub async fn with_retry<F, Fut, T, R>(
    mut operation: F,
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut on_retry: R,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(RetryNotice<'_>),
{
    let mut retry_count = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        let error = match operation(retry_count).await {
            Ok(result) => {
                if retry_count > 0 {
                    tracing::info!(
                        target: "chatflow.llm.retry",
                        attempts = retry_count + 1,
                        "request succeeded after retrying"
                    );
                }
                return Ok(result);
            }
            Err(error) => error,
        };

        if !is_retryable(&error) {
            if !error.is_cancelled() {
                tracing::warn!(
                    target: "chatflow.llm.retry",
                    error = %error,
                    "request failed with non-retryable error"
                );
            }
            return Err(error);
        }

        if retry_count >= config.max_retries {
            tracing::warn!(
                target: "chatflow.llm.retry",
                max_retries = config.max_retries,
                error = %error,
                "request exhausted all retries"
            );
            return Err(error);
        }

        let delay = config.delay_for(retry_count);
        retry_count += 1;
        tracing::info!(
            target: "chatflow.llm.retry",
            attempt = retry_count,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "request failed, backing off"
        );
        on_retry(RetryNotice {
            attempt: retry_count,
            delay,
            error: &error,
        });

        tokio::select! {
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            _ = sleep(delay) => {}
        }
    }
}
