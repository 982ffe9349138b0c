// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Delta batching
//!
//! Small deltas pile up until the batch is large enough, or a delta carries
//! a newline or a space, so consumers see fewer and larger updates.

/// Default buffered character count that forces a flush
pub const DEFAULT_THRESHOLD: usize = 10;

#[derive(Debug, Clone)]
pub struct CoalescingBuffer {
    buffer: String,
    threshold: usize,
}

impl Default for CoalescingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl CoalescingBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            buffer: String::new(),
            threshold: threshold.max(1),
        }
    }

    /// Buffer a delta; returns true when the batch should be flushed.
    pub fn push(&mut self, delta: &str) -> bool {
        self.buffer.push_str(delta);
        self.buffer.chars().count() >= self.threshold
            || delta.contains('\n')
            || delta.contains(' ')
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Cut the buffer at `index`, discarding everything from there on
    pub fn truncate(&mut self, index: usize) {
        self.buffer.truncate(index);
    }

    /// Take all but the last `keep` bytes
    pub fn take_prefix(&mut self, keep: usize) -> String {
        let split = self.buffer.len().saturating_sub(keep);
        let rest = self.buffer.split_off(split);
        std::mem::replace(&mut self.buffer, rest)
    }

    /// Take everything
    pub fn drain(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}
