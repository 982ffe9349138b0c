// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Pluggable token estimation

use crate::config::settings::ConversationConfig;
use crate::llm::message::Message;

/// Estimates the token footprint of a message sequence
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, messages: &[Message]) -> usize;
}

/// Characters-per-token heuristic with a fixed per-message overhead
#[derive(Debug, Clone)]
pub struct CharHeuristic {
    pub chars_per_token: usize,
    pub message_overhead_tokens: usize,
}

impl Default for CharHeuristic {
    fn default() -> Self {
        Self::from(&ConversationConfig::default())
    }
}

impl From<&ConversationConfig> for CharHeuristic {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            chars_per_token: config.chars_per_token.max(1) as usize,
            message_overhead_tokens: config.message_overhead_tokens as usize,
        }
    }
}

impl TokenEstimator for CharHeuristic {
    fn estimate(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| {
                m.content.chars().count().div_ceil(self.chars_per_token)
                    + self.message_overhead_tokens
            })
            .sum()
    }
}

impl<F> TokenEstimator for F
where
    F: Fn(&[Message]) -> usize + Send + Sync,
{
    fn estimate(&self, messages: &[Message]) -> usize {
        self(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(CharHeuristic::default().estimate(&[]), 0);
    }

    #[test]
    fn test_char_heuristic_rounds_up() {
        let heuristic = CharHeuristic {
            chars_per_token: 4,
            message_overhead_tokens: 0,
        };
        let messages = vec![Message::user("abcde")];
        assert_eq!(heuristic.estimate(&messages), 2);
    }

    #[test]
    fn test_overhead_per_message() {
        let heuristic = CharHeuristic {
            chars_per_token: 4,
            message_overhead_tokens: 3,
        };
        let messages = vec![Message::user("abcd"), Message::assistant("")];
        assert_eq!(heuristic.estimate(&messages), 1 + 3 + 3);
    }

    #[test]
    fn test_closure_estimator() {
        let count = |messages: &[Message]| messages.len() * 10;
        let messages = vec![Message::user("x"), Message::user("y")];
        assert_eq!(count.estimate(&messages), 20);
    }
}
