// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session handle
//!
//! `ChatSession` is a cheap-to-clone handle over a session actor. Mutating
//! operations are messages to the actor and return once it has applied them.
//! Submission failures never surface here: they land on the session state
//! and are announced through [`SessionEvent`]s.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::chat::actor::{ActorConfig, SessionActor, SessionCommand};
use crate::chat::events::{EventBus, SessionEvent};
use crate::chat::state::{SessionSnapshot, SessionState};
use crate::config::Settings;
use crate::error::{ChatError, Result};
use crate::llm::message::MessageDraft;
use crate::llm::providers::HttpTransport;
use crate::llm::retry::RetryConfig;
use crate::llm::tokens::{CharHeuristic, TokenEstimator};
use crate::llm::transport::Transport;

/// Handle for interacting with a chat session
#[derive(Clone)]
pub struct ChatSession {
    tx: mpsc::Sender<SessionCommand>,
    events: EventBus,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

/// Builder for creating ChatSession instances
pub struct ChatSessionBuilder {
    settings: Settings,
    transport: Option<Arc<dyn Transport>>,
    estimator: Option<Arc<dyn TokenEstimator>>,
    session_id: Option<String>,
    model: Option<String>,
}

impl ChatSessionBuilder {
    /// Create a new builder with settings
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            transport: None,
            estimator: None,
            session_id: None,
            model: None,
        }
    }

    /// Set the transport; defaults to HTTP against the configured endpoint
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the token estimator; defaults to the configured char heuristic
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Override the configured session id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Override the configured model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Spawn the session actor. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<ChatSession> {
        self.settings.validate()?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::from_settings(&self.settings)));
        let estimator = self
            .estimator
            .unwrap_or_else(|| Arc::new(CharHeuristic::from(&self.settings.conversation)));
        let session_id = self
            .session_id
            .or_else(|| self.settings.transport.session_id.clone());
        let model = self.model.or_else(|| self.settings.transport.model.clone());

        let events = EventBus::new();
        let state = SessionState::new(
            estimator,
            session_id,
            self.settings.conversation.token_limit,
        );
        let (tx, snapshot_rx) = SessionActor::spawn(ActorConfig {
            state,
            transport,
            retry: RetryConfig::from(&self.settings.resilience),
            streaming: self.settings.streaming.clone(),
            model,
            events: events.clone(),
        });

        Ok(ChatSession {
            tx,
            events,
            snapshot_rx,
        })
    }
}

impl ChatSession {
    /// Create a builder for a new session
    pub fn builder(settings: Settings) -> ChatSessionBuilder {
        ChatSessionBuilder::new(settings)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| actor_gone())?;
        reply_rx.await.map_err(|_| actor_gone())
    }

    /// Submit user text. Returns false when the text is blank or a
    /// submission is already active.
    pub async fn submit(&self, text: impl Into<String>) -> Result<bool> {
        let text = text.into();
        self.request(|reply| SessionCommand::Submit { text, reply })
            .await
    }

    /// Replace the pending input
    pub async fn set_input(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| SessionCommand::SetInput { text, reply })
            .await
    }

    /// Submit the pending input, clearing it when accepted
    pub async fn submit_input(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::SubmitInput { reply })
            .await
    }

    /// Cancel the active submission. Returns false when nothing was active.
    pub async fn abort(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::Abort { reply }).await
    }

    /// Resubmit the last user message
    pub async fn retry(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::Retry { reply }).await
    }

    /// Drop the last assistant reply and everything after it, then
    /// regenerate it from the preceding user message
    pub async fn reload(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::Reload { reply }).await
    }

    /// Insert a complete message without going to the network.
    ///
    /// Rejected while a submission is active or when the id is taken.
    pub async fn append(&self, draft: MessageDraft) -> Result<bool> {
        self.request(|reply| SessionCommand::Append { draft, reply })
            .await
    }

    /// Cancel any active submission and empty the session
    pub async fn clear(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Clear { reply }).await
    }

    /// Write the transcript to `path`
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        self.request(|reply| SessionCommand::Save { path, reply })
            .await?
    }

    /// Replace all messages with the transcript at `path`
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        self.request(|reply| SessionCommand::Load { path, reply })
            .await?
    }

    /// Stop the actor, cancelling any active submission
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Shutdown { reply })
            .await
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receive notifications published from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx.wait_for(predicate).await.map_err(|_| actor_gone())?;
        Ok(snapshot.clone())
    }

    /// Wait until no submission is active
    pub async fn wait_until_idle(&self) -> Result<SessionSnapshot> {
        self.wait_for(|s| s.status.is_idle()).await
    }
}

fn actor_gone() -> ChatError {
    ChatError::Session("session actor has shut down".to_string())
}
