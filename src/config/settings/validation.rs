// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ChatError, Result};

use super::Settings;

impl Settings {
    /// Get the API key, checking the env var first.
    pub fn api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.transport.api_key_env)
            .ok()
            .or_else(|| self.transport.api_key.clone())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.transport.endpoint.trim().is_empty() {
            return Err(ChatError::Config("transport.endpoint is empty".to_string()));
        }
        if self.streaming.coalesce_threshold == 0 {
            return Err(ChatError::Config(
                "streaming.coalesce_threshold must be at least 1".to_string(),
            ));
        }
        if self.streaming.stop_sequences.iter().any(|s| s.is_empty()) {
            return Err(ChatError::Config(
                "streaming.stop_sequences must not contain empty markers".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resilience.jitter) {
            return Err(ChatError::Config(format!(
                "resilience.jitter must be within 0.0..=1.0, got {}",
                self.resilience.jitter
            )));
        }
        if self.resilience.max_delay_ms < self.resilience.base_delay_ms {
            return Err(ChatError::Config(
                "resilience.max_delay_ms must not be below base_delay_ms".to_string(),
            ));
        }
        if self.conversation.chars_per_token == 0 {
            return Err(ChatError::Config(
                "conversation.chars_per_token must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
