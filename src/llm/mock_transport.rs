// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted transport for testing
//!
//! Each call to `open` consumes the next script in order. Streams handed out
//! are tracked so tests can assert that every opened stream was released.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::error::{ApiError, ChatError, Result};
use crate::llm::transport::{LineStream, StreamRequest, Transport};

/// What a single `open` call does
pub enum Script {
    /// Yield these lines, then end the stream
    Lines(Vec<String>),
    /// Yield these lines, then an error
    LinesThenError(Vec<String>, ApiError),
    /// Yield these lines, then never produce anything again
    Stall(Vec<String>),
    /// Fail to open
    Fail(ApiError),
    /// Relay whatever is sent on the paired sender
    Channel(mpsc::UnboundedReceiver<Result<String>>),
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Script::Lines(lines) => f.debug_tuple("Lines").field(lines).finish(),
            Script::LinesThenError(lines, e) => {
                f.debug_tuple("LinesThenError").field(lines).field(e).finish()
            }
            Script::Stall(lines) => f.debug_tuple("Stall").field(lines).finish(),
            Script::Fail(e) => f.debug_tuple("Fail").field(e).finish(),
            Script::Channel(_) => f.write_str("Channel"),
        }
    }
}

/// Format a content delta the way a chat-completions endpoint would
pub fn delta_line(content: &str) -> String {
    let chunk = serde_json::json!({ "choices": [{ "delta": { "content": content } }] });
    format!("data: {}", chunk)
}

/// The stream termination line
pub fn done_line() -> String {
    "data: [DONE]".to_string()
}

/// A reply made of the given deltas followed by the sentinel
pub fn reply(deltas: &[&str]) -> Script {
    let mut lines: Vec<String> = deltas.iter().map(|d| delta_line(d)).collect();
    lines.push(done_line());
    Script::Lines(lines)
}

/// A transport that replays scripted responses
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Scripted transport lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script
    pub fn with_script(self, script: Script) -> Self {
        self.push(script);
        self
    }

    /// Queue a reply made of deltas
    pub fn with_reply(self, deltas: &[&str]) -> Self {
        self.with_script(reply(deltas))
    }

    /// Queue an open failure
    pub fn with_failure(self, error: ApiError) -> Self {
        self.with_script(Script::Fail(error))
    }

    /// Queue a script at runtime
    pub fn push(&self, script: Script) {
        lock(&self.scripts).push_back(script);
    }

    /// Queue a hand-fed stream and return its feeder
    pub fn push_channel(&self) -> mpsc::UnboundedSender<Result<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Script::Channel(rx));
        tx
    }

    /// Number of `open` calls made
    pub fn open_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Streams handed out
    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams dropped by the consumer
    pub fn released_streams(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Requests received, oldest first
    pub fn requests(&self) -> Vec<StreamRequest> {
        lock(&self.requests).clone()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<StreamRequest> {
        lock(&self.requests).last().cloned()
    }

    fn track(&self, inner: LineStream) -> LineStream {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Box::pin(TrackedStream {
            inner,
            released: self.released.clone(),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, request: StreamRequest) -> Result<LineStream> {
        lock(&self.requests).push(request);
        let script = lock(&self.scripts).pop_front();

        let inner: LineStream = match script {
            None => {
                return Err(ApiError::InvalidResponse("no scripted response left".to_string()).into())
            }
            Some(Script::Fail(error)) => return Err(error.into()),
            Some(Script::Lines(lines)) => {
                Box::pin(stream::iter(lines.into_iter().map(Ok::<String, ChatError>)))
            }
            Some(Script::LinesThenError(lines, error)) => {
                let items = lines
                    .into_iter()
                    .map(Ok::<String, ChatError>)
                    .chain(std::iter::once(Err(ChatError::from(error))));
                Box::pin(stream::iter(items))
            }
            Some(Script::Stall(lines)) => Box::pin(
                stream::iter(lines.into_iter().map(Ok::<String, ChatError>)).chain(stream::pending()),
            ),
            Some(Script::Channel(rx)) => Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })),
        };

        Ok(self.track(inner))
    }
}

struct TrackedStream {
    inner: LineStream,
    released: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::sse::{parse_line, SseLine};

    #[test]
    fn test_delta_line_parses_back() {
        assert_eq!(
            parse_line(&delta_line("hi \"there\"")),
            SseLine::Delta("hi \"there\"".to_string())
        );
        assert_eq!(parse_line(&done_line()), SseLine::Done);
    }

    #[tokio::test]
    async fn test_scripts_consumed_in_order() {
        let transport = ScriptedTransport::new()
            .with_failure(ApiError::Timeout)
            .with_reply(&["ok"]);

        let first = transport.open(StreamRequest::default()).await;
        assert!(matches!(first, Err(ChatError::Api(ApiError::Timeout))));

        let lines: Vec<String> = transport
            .open(StreamRequest::default())
            .await
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec![delta_line("ok"), done_line()]);

        assert!(transport.open(StreamRequest::default()).await.is_err());
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn test_release_is_tracked() {
        let transport = ScriptedTransport::new().with_reply(&["a"]);
        let stream = transport.open(StreamRequest::default()).await.unwrap();
        assert_eq!(transport.opened_streams(), 1);
        assert_eq!(transport.released_streams(), 0);
        drop(stream);
        assert_eq!(transport.released_streams(), 1);
    }

    #[tokio::test]
    async fn test_channel_script_relays() {
        let transport = ScriptedTransport::new();
        let feeder = transport.push_channel();
        let mut stream = transport.open(StreamRequest::default()).await.unwrap();

        feeder.send(Ok("line".to_string())).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "line");
        drop(feeder);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lines_then_error() {
        let transport = ScriptedTransport::new().with_script(Script::LinesThenError(
            vec![delta_line("x")],
            ApiError::StreamError("reset".to_string()),
        ));
        let items: Vec<Result<String>> = transport
            .open(StreamRequest::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
