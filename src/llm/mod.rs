// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for chatflow
//!
//! Message model, stream protocol, transports, and retry policy.

pub mod message;
pub mod mock_transport;
pub mod providers;
pub mod retry;
pub mod sse;
pub mod tokens;
pub mod transport;

pub use message::*;
pub use transport::*;
