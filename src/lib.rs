// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatflow - streaming chat session engine.
//!
//! This crate exposes the runtime used by the `chatflow` CLI (`src/main.rs`)
//! and by any program embedding a chat session.
//!
//! Architecture highlights:
//! - `chat`: session actor, submission lifecycle, coalescing and stop markers
//! - `llm`: messages, token estimation, the transport seam and its HTTP/SSE implementation
//! - `config`: settings file and validation
//! - `cli`: command-line argument definitions
//!
//! ```no_run
//! # async fn demo() -> chatflow::Result<()> {
//! use chatflow::chat::ChatSession;
//! use chatflow::config::Settings;
//!
//! let session = ChatSession::builder(Settings::load()?).build()?;
//! session.submit("Hello!").await?;
//! let done = session.wait_until_idle().await?;
//! println!("{}", done.messages.last().map(|m| m.content.as_str()).unwrap_or(""));
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;

pub use error::{ChatError, Result};
