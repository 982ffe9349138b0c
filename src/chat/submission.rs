// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! One submission: open the transport, consume the reply, retry on failure
//!
//! The worker never touches session state. It reports progress to the
//! session actor, tagged with its submission id so the actor can ignore
//! reports from a submission it has already cancelled.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chat::streaming::{StreamAccumulator, StreamEventResult};
use crate::config::settings::StreamingConfig;
use crate::error::{ApiError, ChatError, Result};
use crate::llm::retry::{with_retry, RetryConfig};
use crate::llm::sse::{parse_line, SseLine};
use crate::llm::transport::{LineStream, StreamRequest, Transport};

/// What a submission reports back to the session actor
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Progress {
    /// About to open the transport
    Connecting,
    /// The transport accepted the request
    Connected,
    /// The first line of the reply arrived
    Streaming,
    /// Text to append to the in-progress reply
    Flush(String),
    /// The attempt failed and will be retried after `delay`
    Retrying { attempt: u32, delay: Duration },
    /// Backoff elapsed, starting the next attempt
    Resubmitting,
    /// The reply is complete
    Finished,
    /// The submission failed for good
    Failed(String),
}

#[derive(Debug)]
pub(crate) struct ProgressReport {
    pub submission: u64,
    pub progress: Progress,
}

/// The cancellation gate for one in-flight submission
#[derive(Debug)]
pub(crate) struct Submission {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Submission {
    /// Spawn the worker for `request`
    pub fn start(
        id: u64,
        request: StreamRequest,
        transport: Arc<dyn Transport>,
        retry: RetryConfig,
        streaming: StreamingConfig,
        progress: mpsc::UnboundedSender<ProgressReport>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let worker = SubmissionWorker {
            id,
            request,
            transport,
            retry,
            streaming,
            cancel: cancel.clone(),
            progress,
        };
        let task = tokio::spawn(worker.run());
        Self { id, cancel, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Signal cancellation. Idempotent; no effect once the worker is done.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct SubmissionWorker {
    id: u64,
    request: StreamRequest,
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    streaming: StreamingConfig,
    cancel: CancellationToken,
    progress: mpsc::UnboundedSender<ProgressReport>,
}

impl SubmissionWorker {
    fn report(&self, progress: Progress) {
        // The actor is gone only when the session is shutting down.
        let _ = self.progress.send(ProgressReport {
            submission: self.id,
            progress,
        });
    }

    async fn run(self) {
        tracing::debug!(
            target: "chatflow.chat.submission",
            submission = self.id,
            transport = self.transport.name(),
            messages = self.request.messages.len(),
            "submission started"
        );

        let result = with_retry(
            |retry_count| self.attempt(retry_count),
            &self.retry,
            &self.cancel,
            |notice| {
                self.report(Progress::Retrying {
                    attempt: notice.attempt,
                    delay: notice.delay,
                })
            },
        )
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(
                    target: "chatflow.chat.submission",
                    submission = self.id,
                    "submission finished"
                );
                self.report(Progress::Finished);
            }
            Err(ChatError::Cancelled) => {
                tracing::debug!(
                    target: "chatflow.chat.submission",
                    submission = self.id,
                    "submission cancelled"
                );
            }
            Err(error) => {
                tracing::warn!(
                    target: "chatflow.chat.submission",
                    submission = self.id,
                    error = %error,
                    "submission failed"
                );
                self.report(Progress::Failed(error.to_string()));
            }
        }
    }

    async fn attempt(&self, retry_count: u32) -> Result<()> {
        if retry_count > 0 {
            self.report(Progress::Resubmitting);
        }
        self.report(Progress::Connecting);

        let mut lines = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ChatError::Cancelled),
            opened = self.transport.open(self.request.clone()) => opened?,
        };
        self.report(Progress::Connected);

        let mut accumulator = StreamAccumulator::from(&self.streaming);
        let mut first_line = true;

        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ChatError::Cancelled),
                next = self.next_line(&mut lines) => next?,
            };
            let Some(line) = line else {
                break;
            };

            if first_line {
                first_line = false;
                self.report(Progress::Streaming);
            }

            match parse_line(&line) {
                SseLine::Delta(delta) => match accumulator.process_delta(&delta) {
                    StreamEventResult::Buffered => {}
                    StreamEventResult::Flushed(text) => self.report(Progress::Flush(text)),
                    StreamEventResult::Stopped(text) => {
                        tracing::debug!(
                            target: "chatflow.chat.submission",
                            submission = self.id,
                            "stop marker reached, abandoning stream"
                        );
                        drop(lines);
                        if !text.is_empty() {
                            self.report(Progress::Flush(text));
                        }
                        return Ok(());
                    }
                },
                SseLine::Done => break,
                SseLine::Skip => {}
            }
        }

        drop(lines);
        if let Some(rest) = accumulator.finish() {
            self.report(Progress::Flush(rest));
        }

        let stats = accumulator.stats();
        tracing::debug!(
            target: "chatflow.chat.submission",
            submission = self.id,
            deltas = stats.delta_count,
            chars = stats.total_chars,
            flushes = stats.flush_count,
            "stream complete"
        );
        Ok(())
    }

    async fn next_line(&self, lines: &mut LineStream) -> Result<Option<String>> {
        match self.streaming.stall_timeout() {
            Some(limit) => match tokio::time::timeout(limit, lines.next()).await {
                Ok(item) => item.transpose(),
                Err(_) => {
                    tracing::debug!(
                        target: "chatflow.chat.submission",
                        submission = self.id,
                        timeout_secs = limit.as_secs(),
                        "stream stalled"
                    );
                    Err(ApiError::Timeout.into())
                }
            },
            None => lines.next().await.transpose(),
        }
    }
}
