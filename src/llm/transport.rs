// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Transport trait and request types
//!
//! A transport opens a streaming request and hands back raw protocol lines.
//! Dropping the returned stream closes the underlying reader.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::Message;

/// Raw protocol lines from an open stream
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Main trait for streaming transports
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name used in logs
    fn name(&self) -> &str;

    /// Open a streaming request
    async fn open(&self, request: StreamRequest) -> Result<LineStream>;
}

/// Payload for one streaming request
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    /// Conversation so far, oldest first
    pub messages: Vec<Message>,

    /// Session identifier forwarded to the endpoint
    pub session_id: Option<String>,

    /// Model override for this request
    pub model: Option<String>,
}

impl StreamRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}
