// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session state owned by the session actor
//!
//! Every mutation of the message store recomputes the token estimate.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::llm::message::{Conversation, Message};
use crate::llm::tokens::TokenEstimator;

/// Lifecycle status of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Submitting,
    Connecting,
    Streaming,
    Finalizing,
    Erroring,
}

impl SessionStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionStatus::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Submitting => "submitting",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Finalizing => "finalizing",
            SessionStatus::Erroring => "erroring",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Immutable view of the session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub pending_input: String,
    pub status: SessionStatus,
    pub current_streaming_text: String,
    pub token_count: usize,
    pub retry_count: u32,
    pub connection_status: ConnectionStatus,
    /// Last surfaced error
    pub error: Option<String>,
    pub session_id: Option<String>,
    /// Advisory only
    pub token_limit: Option<usize>,
}

pub(crate) struct SessionState {
    conversation: Conversation,
    pub pending_input: String,
    pub status: SessionStatus,
    current_streaming_text: String,
    token_count: usize,
    pub retry_count: u32,
    pub connection_status: ConnectionStatus,
    pub error: Option<String>,
    session_id: Option<String>,
    token_limit: Option<usize>,
    estimator: Arc<dyn TokenEstimator>,
}

impl SessionState {
    pub fn new(
        estimator: Arc<dyn TokenEstimator>,
        session_id: Option<String>,
        token_limit: Option<usize>,
    ) -> Self {
        Self {
            conversation: Conversation::new(),
            pending_input: String::new(),
            status: SessionStatus::Idle,
            current_streaming_text: String::new(),
            token_count: 0,
            retry_count: 0,
            connection_status: ConnectionStatus::Disconnected,
            error: None,
            session_id,
            token_limit,
            estimator,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.conversation.messages().to_vec(),
            pending_input: self.pending_input.clone(),
            status: self.status,
            current_streaming_text: self.current_streaming_text.clone(),
            token_count: self.token_count,
            retry_count: self.retry_count,
            connection_status: self.connection_status,
            error: self.error.clone(),
            session_id: self.session_id.clone(),
            token_limit: self.token_limit,
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.conversation.push(message);
        self.recount_tokens();
    }

    /// Append flushed text to the in-progress reply; returns the reply so far
    pub fn append_stream(&mut self, text: &str) -> &str {
        let content = self.conversation.append_in_progress(text).content.clone();
        self.current_streaming_text = content;
        self.recount_tokens();
        &self.current_streaming_text
    }

    pub fn finalize_stream(&mut self) -> Message {
        let message = self.conversation.finalize_in_progress();
        self.current_streaming_text.clear();
        self.recount_tokens();
        message
    }

    pub fn discard_stream(&mut self) {
        self.current_streaming_text.clear();
        if self.conversation.discard_in_progress().is_some() {
            self.recount_tokens();
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.conversation.truncate(len);
        self.current_streaming_text.clear();
        self.recount_tokens();
    }

    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.conversation.replace_all(messages);
        self.current_streaming_text.clear();
        self.recount_tokens();
    }

    /// Back to an empty idle session, keeping identity and settings
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.pending_input.clear();
        self.status = SessionStatus::Idle;
        self.current_streaming_text.clear();
        self.token_count = 0;
        self.retry_count = 0;
        self.connection_status = ConnectionStatus::Disconnected;
        self.error = None;
    }

    fn recount_tokens(&mut self) {
        self.token_count = self.estimator.estimate(self.conversation.messages());
        if let Some(limit) = self.token_limit {
            if self.token_count > limit {
                tracing::warn!(
                    target: "chatflow.chat.session",
                    token_count = self.token_count,
                    token_limit = limit,
                    "conversation exceeds the advisory token limit"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tokens::CharHeuristic;

    fn state() -> SessionState {
        let estimator = CharHeuristic {
            chars_per_token: 1,
            message_overhead_tokens: 0,
        };
        SessionState::new(Arc::new(estimator), Some("s".to_string()), None)
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Streaming).unwrap(),
            "\"streaming\""
        );
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connected).unwrap(),
            "\"connected\""
        );
        assert_eq!(SessionStatus::Erroring.to_string(), "erroring");
    }

    #[test]
    fn test_token_count_tracks_mutations() {
        let mut state = state();
        state.push_message(Message::user("abcd"));
        assert_eq!(state.snapshot().token_count, 4);

        state.append_stream("xy");
        assert_eq!(state.snapshot().token_count, 6);

        state.discard_stream();
        assert_eq!(state.snapshot().token_count, 4);
    }

    #[test]
    fn test_streaming_text_mirrors_in_progress() {
        let mut state = state();
        state.push_message(Message::user("hi"));
        assert_eq!(state.append_stream("Hel"), "Hel");
        assert_eq!(state.append_stream("lo"), "Hello");
        assert_eq!(state.snapshot().current_streaming_text, "Hello");

        let reply = state.finalize_stream();
        assert_eq!(reply.content, "Hello");
        assert!(state.snapshot().current_streaming_text.is_empty());
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn test_reset_keeps_session_id() {
        let mut state = state();
        state.push_message(Message::user("hi"));
        state.pending_input = "draft".to_string();
        state.error = Some("boom".to_string());
        state.retry_count = 2;
        state.reset();

        let snapshot = state.snapshot();
        assert!(snapshot.messages.is_empty());
        assert!(snapshot.pending_input.is_empty());
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.retry_count, 0);
        assert_eq!(snapshot.token_count, 0);
        assert_eq!(snapshot.session_id.as_deref(), Some("s"));
    }
}
