// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for chatflow
//!
//! Handles loading and saving settings from ~/.chatflow/settings.json

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod io;
mod validation;

/// Main settings structure, stored in ~/.chatflow/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Streaming endpoint configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Retry and resilience settings for transport calls
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Delta buffering and stop marker settings
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Conversation and token estimation settings
    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Streaming endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Chat-completions endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with each request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Session identifier forwarded to the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            session_id: None,
        }
    }
}

/// Retry and resilience configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResilienceConfig {
    /// Maximum number of retry attempts per submission
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter percentage (0.0 to 1.0) for randomizing delays
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

/// Delta buffering and stop marker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingConfig {
    /// Buffered character count that forces a flush to the consumer
    #[serde(default = "default_coalesce_threshold")]
    pub coalesce_threshold: usize,

    /// Markers that end the assistant response when they appear in the output
    #[serde(default = "default_stop_sequences")]
    pub stop_sequences: Vec<String>,

    /// Seconds without a stream line before the stream counts as stalled (0 disables)
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            coalesce_threshold: default_coalesce_threshold(),
            stop_sequences: default_stop_sequences(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

impl StreamingConfig {
    /// Stall timeout as a duration, `None` when disabled
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_secs > 0).then(|| Duration::from_secs(self.stall_timeout_secs))
    }
}

/// Conversation and token estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationConfig {
    /// Estimated characters per token for calculations
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,

    /// Overhead tokens per message for metadata
    #[serde(default = "default_message_overhead_tokens")]
    pub message_overhead_tokens: u32,

    /// Advisory token limit; exceeding it is logged, never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<usize>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            message_overhead_tokens: default_message_overhead_tokens(),
            token_limit: None,
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "CHATFLOW_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> f64 {
    0.0
}

fn default_coalesce_threshold() -> usize {
    10
}

fn default_stop_sequences() -> Vec<String> {
    ["</tool>", "</function>", "<|end|>", "<|stop|>"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_stall_timeout_secs() -> u64 {
    120
}

fn default_chars_per_token() -> u32 {
    4
}

fn default_message_overhead_tokens() -> u32 {
    4
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.resilience.max_retries, 3);
        assert_eq!(settings.resilience.base_delay_ms, 1000);
        assert_eq!(settings.streaming.coalesce_threshold, 10);
        assert!(settings.transport.session_id.is_none());
    }

    #[test]
    fn test_streaming_config_default_stop_sequences() {
        let config = StreamingConfig::default();
        assert_eq!(
            config.stop_sequences,
            vec!["</tool>", "</function>", "<|end|>", "<|stop|>"]
        );
    }

    #[test]
    fn test_stall_timeout_disabled_at_zero() {
        let config = StreamingConfig {
            stall_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.stall_timeout().is_none());
        assert_eq!(
            StreamingConfig::default().stall_timeout(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"resilience": {"max_retries": 5}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.resilience.max_retries, 5);
        assert_eq!(settings.resilience.base_delay_ms, 1000);
        assert_eq!(settings.streaming, StreamingConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.transport.session_id = Some("abc".to_string());
        settings.conversation.token_limit = Some(8000);
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.json");
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, Settings::default());
    }
}
