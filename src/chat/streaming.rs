// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response handling
//!
//! Turns content deltas into flushes for the consumer. Separated from the
//! transport I/O so it can be tested on plain strings.

use crate::chat::coalesce::CoalescingBuffer;
use crate::chat::stop_sequences::StopSequences;
use crate::config::settings::StreamingConfig;

/// Accumulator for streaming response content
#[derive(Debug, Clone)]
pub struct StreamAccumulator {
    buffer: CoalescingBuffer,
    stops: StopSequences,
    stats: StreamStats,
    stopped: bool,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::from(&StreamingConfig::default())
    }
}

impl From<&StreamingConfig> for StreamAccumulator {
    fn from(config: &StreamingConfig) -> Self {
        Self::new(
            config.coalesce_threshold,
            StopSequences::from(config.stop_sequences.as_slice()),
        )
    }
}

impl StreamAccumulator {
    pub fn new(threshold: usize, stops: StopSequences) -> Self {
        Self {
            buffer: CoalescingBuffer::new(threshold),
            stops,
            stats: StreamStats::default(),
            stopped: false,
        }
    }

    /// Whether a stop marker has ended the response
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Process a delta and return what, if anything, to hand to the consumer
    pub fn process_delta(&mut self, delta: &str) -> StreamEventResult {
        if self.stopped {
            return StreamEventResult::Buffered;
        }
        self.stats.delta_count += 1;
        self.stats.total_chars += delta.chars().count();

        let triggered = self.buffer.push(delta);

        if let Some(index) = self.stops.find_earliest(self.buffer.as_str()) {
            self.buffer.truncate(index);
            self.stopped = true;
            let text = self.buffer.drain();
            self.record_flush(&text);
            return StreamEventResult::Stopped(text);
        }

        if !triggered {
            return StreamEventResult::Buffered;
        }

        let hold = self.stops.holdback_len(self.buffer.as_str());
        let text = self.buffer.take_prefix(hold);
        if text.is_empty() {
            return StreamEventResult::Buffered;
        }
        self.record_flush(&text);
        StreamEventResult::Flushed(text)
    }

    /// Flush whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        let text = self.buffer.drain();
        if text.is_empty() {
            return None;
        }
        self.record_flush(&text);
        Some(text)
    }

    fn record_flush(&mut self, text: &str) {
        if !text.is_empty() {
            self.stats.flush_count += 1;
        }
    }
}

/// Result of processing a delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventResult {
    /// Held in the buffer
    Buffered,
    /// Text to append to the in-progress message
    Flushed(String),
    /// A stop marker was found; this is the last text, possibly empty
    Stopped(String),
}

impl StreamEventResult {
    /// Text to append, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEventResult::Flushed(text) => Some(text),
            StreamEventResult::Stopped(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, StreamEventResult::Stopped(_))
    }
}

/// Statistics about a streaming response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Total characters received
    pub total_chars: usize,
    /// Number of deltas received
    pub delta_count: usize,
    /// Number of non-empty flushes handed to the consumer
    pub flush_count: usize,
}
