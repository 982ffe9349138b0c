// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Server-sent event parsing for chat-completion streams
//!
//! Lines look like `data: {"choices":[{"delta":{"content":"Hi"}}]}` and the
//! stream ends with `data: [DONE]`. Anything else is noise and is skipped.

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;

use crate::error::{ChatError, Result};
use crate::llm::transport::LineStream;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Content deltas extracted from a line stream
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Classification of a single protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A non-empty content fragment
    Delta(String),
    /// The termination sentinel
    Done,
    /// Comment, keep-alive, malformed payload, or a chunk without content
    Skip,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Classify one raw line.
pub fn parse_line(line: &str) -> SseLine {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Skip;
    };

    if data == DONE_SENTINEL {
        return SseLine::Done;
    }

    let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
        return SseLine::Skip;
    };

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
        .map(SseLine::Delta)
        .unwrap_or(SseLine::Skip)
}

/// Turn a line stream into a delta stream that ends at the sentinel.
///
/// Transport errors are passed through; the line stream is dropped as soon
/// as the sentinel is seen.
pub fn delta_stream(lines: LineStream) -> DeltaStream {
    Box::pin(stream::unfold(Some(lines), |state| async move {
        let mut lines = state?;
        loop {
            match lines.next().await? {
                Ok(line) => match parse_line(&line) {
                    SseLine::Delta(text) => return Some((Ok(text), Some(lines))),
                    SseLine::Done => return None,
                    SseLine::Skip => continue,
                },
                Err(e) => return Some((Err(e), None)),
            }
        }
    }))
}

struct LineSplitter<S> {
    chunks: Pin<Box<S>>,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    finished: bool,
}

impl<S> LineSplitter<S> {
    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.pop();
            self.ready
                .push_back(String::from_utf8_lossy(&line).into_owned());
        }
    }

    fn flush_tail(&mut self) {
        if !self.buffer.is_empty() {
            let tail = std::mem::take(&mut self.buffer);
            self.ready
                .push_back(String::from_utf8_lossy(&tail).into_owned());
        }
    }
}

/// Split a chunked byte stream into lines.
///
/// Bytes are buffered until a newline arrives, so lines and multi-byte
/// characters split across chunks come out whole. A trailing line without
/// a newline is emitted when the byte stream ends.
pub fn split_lines<S, B, E>(chunks: S) -> LineStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatError> + Send + 'static,
{
    let splitter = LineSplitter {
        chunks: Box::pin(chunks),
        buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(splitter, |mut s| async move {
        loop {
            if let Some(line) = s.ready.pop_front() {
                return Some((Ok(line), s));
            }
            if s.finished {
                return None;
            }
            match s.chunks.next().await {
                Some(Ok(chunk)) => s.push(chunk.as_ref()),
                Some(Err(e)) => {
                    s.finished = true;
                    return Some((Err(e.into()), s));
                }
                None => {
                    s.finished = true;
                    s.flush_tail();
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn lines(items: &[&str]) -> LineStream {
        let owned: Vec<Result<String>> = items.iter().map(|s| Ok(s.to_string())).collect();
        Box::pin(stream::iter(owned))
    }

    #[test]
    fn test_parse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_line(line), SseLine::Delta("Hello".to_string()));
    }

    #[test]
    fn test_parse_done_sentinel() {
        assert_eq!(parse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_line("data: [DONE]\r"), SseLine::Done);
    }

    #[test]
    fn test_parse_skips_noise() {
        assert_eq!(parse_line(""), SseLine::Skip);
        assert_eq!(parse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_line("event: message"), SseLine::Skip);
        assert_eq!(parse_line("data:{\"no\":\"space\"}"), SseLine::Skip);
    }

    #[test]
    fn test_parse_skips_malformed_json() {
        assert_eq!(parse_line("data: {not json"), SseLine::Skip);
    }

    #[test]
    fn test_parse_skips_missing_content() {
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Skip
        );
        assert_eq!(parse_line(r#"data: {"choices":[]}"#), SseLine::Skip);
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#),
            SseLine::Skip
        );
    }

    #[test]
    fn test_parse_uses_first_choice() {
        let line = r#"data: {"choices":[{"delta":{"content":"a"}},{"delta":{"content":"b"}}]}"#;
        assert_eq!(parse_line(line), SseLine::Delta("a".to_string()));
    }

    #[tokio::test]
    async fn test_delta_stream_stops_at_done() {
        let deltas: Vec<String> = delta_stream(lines(&[
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            ": ping",
            r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"ignored"}}]}"#,
        ]))
        .map(|d| d.unwrap())
        .collect()
        .await;

        assert_eq!(deltas, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_delta_stream_passes_errors_through() {
        let items: Vec<Result<String>> = vec![
            Ok(r#"data: {"choices":[{"delta":{"content":"x"}}]}"#.to_string()),
            Err(ApiError::StreamError("reset".to_string()).into()),
        ];
        let mut deltas = delta_stream(Box::pin(stream::iter(items)));

        assert_eq!(deltas.next().await.unwrap().unwrap(), "x");
        assert!(deltas.next().await.unwrap().is_err());
        assert!(deltas.next().await.is_none());
    }

    #[tokio::test]
    async fn test_split_lines_across_chunks() {
        let chunks: Vec<std::result::Result<Vec<u8>, ChatError>> = vec![
            Ok(b"data: one\nda".to_vec()),
            Ok(b"ta: two\n".to_vec()),
            Ok(b"tail".to_vec()),
        ];
        let out: Vec<String> = split_lines(stream::iter(chunks))
            .map(|l| l.unwrap())
            .collect()
            .await;

        assert_eq!(out, vec!["data: one", "data: two", "tail"]);
    }

    #[tokio::test]
    async fn test_split_lines_reassembles_utf8() {
        let bytes = "héllo\n".as_bytes();
        let chunks: Vec<std::result::Result<Vec<u8>, ChatError>> =
            vec![Ok(bytes[..2].to_vec()), Ok(bytes[2..].to_vec())];
        let out: Vec<String> = split_lines(stream::iter(chunks))
            .map(|l| l.unwrap())
            .collect()
            .await;

        assert_eq!(out, vec!["héllo"]);
    }
}
