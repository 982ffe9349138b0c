// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session actor
//!
//! Owns the session state. Commands from handles and progress from the active
//! submission are processed one at a time, so store mutations and the
//! notifications they trigger never interleave.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::chat::events::{EventBus, SessionEvent};
use crate::chat::state::{ConnectionStatus, SessionSnapshot, SessionState, SessionStatus};
use crate::chat::submission::{Progress, ProgressReport, Submission};
use crate::chat::transcript;
use crate::config::settings::StreamingConfig;
use crate::error::{ChatError, Result};
use crate::llm::message::{Message, MessageDraft, Role};
use crate::llm::retry::RetryConfig;
use crate::llm::transport::{StreamRequest, Transport};

pub(crate) const CHANNEL_CAPACITY: usize = 64;

/// Commands that can be sent to a session actor
pub(crate) enum SessionCommand {
    Submit {
        text: String,
        reply: oneshot::Sender<bool>,
    },
    SetInput {
        text: String,
        reply: oneshot::Sender<()>,
    },
    SubmitInput {
        reply: oneshot::Sender<bool>,
    },
    Abort {
        reply: oneshot::Sender<bool>,
    },
    Retry {
        reply: oneshot::Sender<bool>,
    },
    Reload {
        reply: oneshot::Sender<bool>,
    },
    Append {
        draft: MessageDraft,
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Save {
        path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    Load {
        path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Everything the actor needs besides its channels
pub(crate) struct ActorConfig {
    pub state: SessionState,
    pub transport: Arc<dyn Transport>,
    pub retry: RetryConfig,
    pub streaming: StreamingConfig,
    pub model: Option<String>,
    pub events: EventBus,
}

pub(crate) struct SessionActor {
    state: SessionState,
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    streaming: StreamingConfig,
    model: Option<String>,
    events: EventBus,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    command_rx: mpsc::Receiver<SessionCommand>,
    progress_tx: mpsc::UnboundedSender<ProgressReport>,
    progress_rx: mpsc::UnboundedReceiver<ProgressReport>,
    active: Option<Submission>,
    next_submission: u64,
}

impl SessionActor {
    /// Spawn the actor task.
    ///
    /// Returns the command sender and a receiver that always holds the
    /// latest snapshot.
    pub fn spawn(
        config: ActorConfig,
    ) -> (
        mpsc::Sender<SessionCommand>,
        watch::Receiver<SessionSnapshot>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(config.state.snapshot());
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();

        let actor = Self {
            state: config.state,
            transport: config.transport,
            retry: config.retry,
            streaming: config.streaming,
            model: config.model,
            events: config.events,
            snapshot_tx,
            command_rx,
            progress_tx,
            progress_rx,
            active: None,
            next_submission: 0,
        };
        tokio::spawn(actor.run());

        (command_tx, snapshot_rx)
    }

    async fn run(mut self) {
        tracing::debug!(
            target: "chatflow.chat.session",
            session_id = ?self.state.session_id(),
            transport = self.transport.name(),
            "session actor started"
        );

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => match command {
                    Some(SessionCommand::Shutdown { reply }) => {
                        self.cancel_active();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!(
                            target: "chatflow.chat.session",
                            "all handles dropped, shutting down"
                        );
                        self.cancel_active();
                        break;
                    }
                },

                Some(report) = self.progress_rx.recv() => self.handle_progress(report),
            }
        }

        tracing::debug!(target: "chatflow.chat.session", "session actor stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Submit { text, reply } => {
                let _ = reply.send(self.submit(text));
            }
            SessionCommand::SetInput { text, reply } => {
                self.state.pending_input = text;
                self.publish_update();
                let _ = reply.send(());
            }
            SessionCommand::SubmitInput { reply } => {
                let text = self.state.pending_input.clone();
                let accepted = self.submit(text);
                if accepted {
                    self.state.pending_input.clear();
                    self.publish_update();
                }
                let _ = reply.send(accepted);
            }
            SessionCommand::Abort { reply } => {
                let _ = reply.send(self.abort());
            }
            SessionCommand::Retry { reply } => {
                let _ = reply.send(self.retry());
            }
            SessionCommand::Reload { reply } => {
                let _ = reply.send(self.reload());
            }
            SessionCommand::Append { draft, reply } => {
                let _ = reply.send(self.append(draft));
            }
            SessionCommand::Clear { reply } => {
                self.clear();
                let _ = reply.send(());
            }
            SessionCommand::Save { path, reply } => {
                let _ = reply.send(transcript::save_to(&path, self.state.messages()));
            }
            SessionCommand::Load { path, reply } => {
                let _ = reply.send(self.load(path));
            }
            SessionCommand::Shutdown { reply } => {
                // Handled in the run loop.
                let _ = reply.send(());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn submit(&mut self, text: String) -> bool {
        if text.trim().is_empty() || !self.state.status.is_idle() {
            tracing::debug!(
                target: "chatflow.chat.session",
                status = %self.state.status,
                "submit ignored"
            );
            return false;
        }

        self.state.push_message(Message::user(text));
        self.start_submission();
        true
    }

    fn retry(&mut self) -> bool {
        if !self.state.status.is_idle() {
            return false;
        }
        let Some(index) = self.state.conversation().last_index_of(Role::User) else {
            return false;
        };

        if index + 1 != self.state.messages().len() {
            let content = self.state.messages()[index].content.clone();
            self.state.push_message(Message::user(content));
        }
        self.start_submission();
        true
    }

    fn reload(&mut self) -> bool {
        if !self.state.status.is_idle() {
            return false;
        }
        let conversation = self.state.conversation();
        let Some(assistant) = conversation.last_index_of(Role::Assistant) else {
            return false;
        };
        let has_prompt = conversation.messages()[..assistant]
            .iter()
            .any(|m| m.role == Role::User);
        if !has_prompt {
            return false;
        }

        self.state.truncate(assistant);
        self.start_submission();
        true
    }

    fn append(&mut self, draft: MessageDraft) -> bool {
        if !self.state.status.is_idle() {
            return false;
        }
        let message = draft.into_message();
        if self.state.conversation().contains_id(message.id) {
            tracing::debug!(
                target: "chatflow.chat.session",
                id = %message.id,
                "append rejected: duplicate message id"
            );
            return false;
        }

        self.state.push_message(message);
        self.publish_update();
        true
    }

    fn abort(&mut self) -> bool {
        let Some(submission) = self.active.take() else {
            return false;
        };
        submission.cancel();
        tracing::debug!(
            target: "chatflow.chat.session",
            submission = submission.id(),
            worker_done = submission.is_finished(),
            "submission aborted"
        );

        self.state.discard_stream();
        self.state.status = SessionStatus::Idle;
        self.state.connection_status = ConnectionStatus::Disconnected;
        self.events.publish(SessionEvent::Abort);
        self.publish_update();
        true
    }

    fn clear(&mut self) {
        self.abort();
        self.state.reset();
        self.publish_update();
    }

    fn load(&mut self, path: PathBuf) -> Result<()> {
        if !self.state.status.is_idle() {
            return Err(ChatError::Session(
                "cannot load a transcript while a submission is active".to_string(),
            ));
        }

        match transcript::load_from(&path) {
            Ok(messages) => {
                self.state.replace_messages(messages);
                self.state.error = None;
                self.publish_update();
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(
                    target: "chatflow.chat.session",
                    path = %path.display(),
                    error = %message,
                    "transcript load failed"
                );
                self.state.error = Some(message.clone());
                self.events.publish(SessionEvent::Error { message });
                self.publish_update();
                Err(error)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Submission lifecycle
    // ------------------------------------------------------------------------

    fn start_submission(&mut self) {
        self.next_submission += 1;
        let id = self.next_submission;

        self.state.status = SessionStatus::Submitting;
        self.state.error = None;
        self.state.retry_count = 0;
        self.publish_update();

        let request = StreamRequest::new(self.state.messages().to_vec())
            .with_session_id(self.state.session_id().map(str::to_string))
            .with_model(self.model.clone());

        tracing::debug!(
            target: "chatflow.chat.session",
            submission = id,
            messages = request.messages.len(),
            "starting submission"
        );

        self.active = Some(Submission::start(
            id,
            request,
            self.transport.clone(),
            self.retry.clone(),
            self.streaming.clone(),
            self.progress_tx.clone(),
        ));
    }

    fn cancel_active(&mut self) {
        if let Some(submission) = self.active.take() {
            submission.cancel();
        }
    }

    fn handle_progress(&mut self, report: ProgressReport) {
        let current = self.active.as_ref().map(Submission::id);
        if current != Some(report.submission) {
            tracing::trace!(
                target: "chatflow.chat.session",
                submission = report.submission,
                "dropping progress from stale submission"
            );
            return;
        }

        match report.progress {
            Progress::Connecting => {
                self.state.status = SessionStatus::Connecting;
                self.state.connection_status = ConnectionStatus::Connecting;
                self.publish_update();
            }
            Progress::Connected => {
                self.state.connection_status = ConnectionStatus::Connected;
                self.publish_update();
            }
            Progress::Streaming => {
                self.state.status = SessionStatus::Streaming;
                self.publish_update();
            }
            Progress::Flush(text) => {
                let full = self.state.append_stream(&text).to_string();
                self.events.publish(SessionEvent::Stream { text: full });
                self.publish_update();
            }
            Progress::Retrying { attempt, delay } => {
                self.state.discard_stream();
                self.state.status = SessionStatus::Erroring;
                self.state.connection_status = ConnectionStatus::Disconnected;
                self.state.retry_count = attempt;
                self.events.publish(SessionEvent::Retry { attempt, delay });
                self.publish_update();
            }
            Progress::Resubmitting => {
                self.state.status = SessionStatus::Submitting;
                self.publish_update();
            }
            Progress::Finished => {
                self.state.status = SessionStatus::Finalizing;
                self.publish_update();

                let message = self.state.finalize_stream();
                self.active = None;
                self.state.status = SessionStatus::Idle;
                self.state.connection_status = ConnectionStatus::Disconnected;
                self.state.retry_count = 0;
                self.events.publish(SessionEvent::Finish { message });
                self.publish_update();
            }
            Progress::Failed(message) => {
                self.state.discard_stream();
                self.state.status = SessionStatus::Erroring;
                self.state.error = Some(message.clone());
                self.publish_update();

                self.active = None;
                self.state.status = SessionStatus::Idle;
                self.state.connection_status = ConnectionStatus::Disconnected;
                self.events.publish(SessionEvent::Error { message });
                self.publish_update();
            }
        }
    }

    fn publish_update(&self) {
        let snapshot = self.state.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        self.events.publish(SessionEvent::Update(snapshot));
    }
}
