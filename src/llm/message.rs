// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types and the conversation message store
//!
//! The store is append-only except for a single in-progress assistant
//! message whose content grows while a reply streams in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Role of the message sender
    pub role: Role,

    /// Text content of the message
    pub content: String,

    /// When the message was created
    pub created_at: DateTime<Utc>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    /// Create a message with a fresh id and timestamp
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A message supplied from outside the network path, e.g. restored history.
///
/// Missing identity fields are filled in when the draft is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub role: Option<Role>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MessageDraft {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Some(role),
            content: content.into(),
            created_at: None,
        }
    }

    /// Materialize into a message; a draft without a role is a user message.
    pub fn into_message(self) -> Message {
        Message {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            role: self.role.unwrap_or(Role::User),
            content: self.content,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

impl From<Message> for MessageDraft {
    fn from(message: Message) -> Self {
        Self {
            id: Some(message.id),
            role: Some(message.role),
            content: message.content,
            created_at: Some(message.created_at),
        }
    }
}

/// Ordered message store with at most one in-progress assistant message
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    in_progress: bool,
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in store order, including the in-progress one
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains_id(&self, id: Uuid) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Append a completed message.
    ///
    /// When a reply is streaming, the message lands just before the
    /// in-progress slot so that slot stays last.
    pub fn push(&mut self, message: Message) {
        if self.in_progress {
            let slot = self.messages.len() - 1;
            self.messages.insert(slot, message);
        } else {
            self.messages.push(message);
        }
    }

    /// The in-progress assistant message, if a reply is streaming
    pub fn in_progress(&self) -> Option<&Message> {
        if self.in_progress {
            self.messages.last()
        } else {
            None
        }
    }

    /// Append streamed text, opening the in-progress slot on first use
    pub fn append_in_progress(&mut self, text: &str) -> &Message {
        if !self.in_progress {
            self.messages.push(Message::assistant(String::new()));
            self.in_progress = true;
        }
        let idx = self.messages.len() - 1;
        self.messages[idx].content.push_str(text);
        &self.messages[idx]
    }

    /// Freeze the in-progress message, opening an empty one if nothing streamed
    pub fn finalize_in_progress(&mut self) -> Message {
        if !self.in_progress {
            self.messages.push(Message::assistant(String::new()));
        }
        self.in_progress = false;
        self.messages[self.messages.len() - 1].clone()
    }

    /// Drop the in-progress message and its partial content
    pub fn discard_in_progress(&mut self) -> Option<Message> {
        if !self.in_progress {
            return None;
        }
        self.in_progress = false;
        self.messages.pop()
    }

    /// Index of the most recent message with the given role
    pub fn last_index_of(&self, role: Role) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == role)
    }

    /// Most recent user message
    pub fn last_user(&self) -> Option<&Message> {
        self.last_index_of(Role::User).map(|i| &self.messages[i])
    }

    /// Keep only the first `len` messages
    pub fn truncate(&mut self, len: usize) {
        if len < self.messages.len() {
            self.messages.truncate(len);
            self.in_progress = false;
        }
    }

    /// Replace every message wholesale
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.in_progress = false;
    }

    /// Clear all messages
    pub fn clear(&mut self) {
        self.messages.clear();
        self.in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_message_ids_unique() {
        let a = Message::user("same");
        let b = Message::user("same");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let msg = Message::assistant("Hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_draft_fills_missing_fields() {
        let draft = MessageDraft {
            content: "restored".to_string(),
            ..Default::default()
        };
        let msg = draft.into_message();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "restored");
    }

    #[test]
    fn test_draft_keeps_explicit_id() {
        let original = Message::system("rules");
        let msg = MessageDraft::from(original.clone()).into_message();
        assert_eq!(msg, original);
    }

    #[test]
    fn test_in_progress_lifecycle() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        assert!(conv.in_progress().is_none());

        conv.append_in_progress("Hel");
        conv.append_in_progress("lo");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.in_progress().unwrap().content, "Hello");

        let final_msg = conv.finalize_in_progress();
        assert_eq!(final_msg.content, "Hello");
        assert_eq!(final_msg.role, Role::Assistant);
        assert!(conv.in_progress().is_none());
    }

    #[test]
    fn test_finalize_without_content_appends_empty_reply() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        let reply = conv.finalize_in_progress();
        assert_eq!(reply.content, "");
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_discard_in_progress() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        assert!(conv.discard_in_progress().is_none());

        conv.append_in_progress("partial");
        let dropped = conv.discard_in_progress().unwrap();
        assert_eq!(dropped.content, "partial");
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_push_keeps_in_progress_last() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        conv.append_in_progress("streaming");
        conv.push(Message::system("note"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[1].content, "note");
        assert_eq!(conv.in_progress().unwrap().content, "streaming");
    }

    #[test]
    fn test_last_index_of() {
        let mut conv = Conversation::new();
        conv.push(Message::user("a"));
        conv.push(Message::assistant("b"));
        conv.push(Message::user("c"));
        assert_eq!(conv.last_index_of(Role::Assistant), Some(1));
        assert_eq!(conv.last_user().unwrap().content, "c");
        assert_eq!(conv.last_index_of(Role::System), None);
    }

    #[test]
    fn test_truncate_and_clear() {
        let mut conv = Conversation::new();
        conv.push(Message::user("a"));
        conv.push(Message::assistant("b"));
        conv.truncate(1);
        assert_eq!(conv.len(), 1);
        conv.clear();
        assert!(conv.is_empty());
    }
}
