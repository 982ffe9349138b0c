// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for chatflow
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// Main error type for chatflow operations
#[derive(Error, Debug)]
pub enum ChatError {
    /// Transport-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The submission was cancelled by the caller
    #[error("Cancelled")]
    Cancelled,

    /// A transcript line could not be decoded
    #[error("Transcript error on line {line}: {message}")]
    Transcript { line: usize, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Transport-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the endpoint
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from the endpoint
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Endpoint returned a non-success status
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for a response or for the next stream line
    #[error("Request timed out")]
    Timeout,

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

impl ChatError {
    /// Whether this error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }
}

/// Result type alias for chatflow operations
pub type Result<T> = std::result::Result<T, ChatError>;
