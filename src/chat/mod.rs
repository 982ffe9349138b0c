// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! A [`ChatSession`] drives one conversation: it accepts user input, streams
//! the assistant reply through the coalescing buffer and stop-marker trimmer,
//! retries transient failures, and publishes [`SessionEvent`]s as it goes.

pub(crate) mod actor;
pub mod coalesce;
pub mod commands;
pub mod events;
pub mod session;
pub mod state;
pub mod stop_sequences;
pub mod streaming;
pub(crate) mod submission;
pub mod transcript;

pub use events::{EventBus, SessionEvent};
pub use session::{ChatSession, ChatSessionBuilder};
pub use state::{ConnectionStatus, SessionSnapshot, SessionStatus};
