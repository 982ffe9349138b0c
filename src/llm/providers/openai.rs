// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible chat-completions transport
//!
//! Posts the conversation with `stream: true` and hands back the raw SSE
//! lines of the response body.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::settings::Settings;
use crate::error::{ApiError, ChatError, Result};
use crate::llm::sse::split_lines;
use crate::llm::transport::{LineStream, StreamRequest, Transport};

/// Streaming transport over HTTP
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
        }
    }

    /// Build a transport from the transport section of the settings
    pub fn from_settings(settings: &Settings) -> Self {
        let mut transport = Self::new(settings.transport.endpoint.clone());
        transport.api_key = settings.api_key();
        transport.model = settings.transport.model.clone();
        transport
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, request: &StreamRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone().or_else(|| self.model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
            session_id: request.session_id.clone(),
        }
    }

    fn parse_error(status: u16, retry_after: Option<u32>, body: &str) -> ApiError {
        match status {
            401 | 403 => return ApiError::AuthenticationFailed,
            429 => return ApiError::RateLimited(retry_after.unwrap_or(60)),
            _ => {}
        }

        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        ApiError::ServerError { status, message }
    }

    fn map_send_error(error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, request: StreamRequest) -> Result<LineStream> {
        let body = self.build_request(&request);

        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        tracing::debug!(
            target: "chatflow.llm.http",
            endpoint = %self.endpoint,
            messages = body.messages.len(),
            session_id = ?body.session_id,
            "opening stream"
        );

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            let error = Self::parse_error(status, retry_after, &body);
            tracing::debug!(
                target: "chatflow.llm.http",
                status,
                error = %error,
                "stream request rejected"
            );
            return Err(error.into());
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::from(ApiError::StreamError(e.to_string()))));
        Ok(split_lines(chunks))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::Message;

    #[test]
    fn test_transport_builder() {
        let transport = HttpTransport::new("http://localhost:1234/v1/chat/completions")
            .with_api_key("secret")
            .with_model("gpt-test");
        assert_eq!(transport.endpoint(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(transport.model.as_deref(), Some("gpt-test"));
        assert_eq!(transport.name(), "http");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let transport = HttpTransport::new("http://x").with_api_key("secret");
        let debug = format!("{:?}", transport);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_build_request_body() {
        let transport = HttpTransport::new("http://x").with_model("default-model");
        let request = StreamRequest::new(vec![Message::system("be brief"), Message::user("hi")])
            .with_session_id(Some("abc".to_string()));

        let body = serde_json::to_value(transport.build_request(&request)).unwrap();
        assert_eq!(body["model"], "default-model");
        assert_eq!(body["stream"], true);
        assert_eq!(body["session_id"], "abc");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_build_request_model_override_and_omissions() {
        let transport = HttpTransport::new("http://x").with_model("default-model");
        let request = StreamRequest::new(vec![]).with_model(Some("override".to_string()));
        let body = serde_json::to_value(transport.build_request(&request)).unwrap();
        assert_eq!(body["model"], "override");
        assert!(body.get("session_id").is_none());

        let bare = HttpTransport::new("http://x");
        let body = serde_json::to_value(bare.build_request(&StreamRequest::new(vec![]))).unwrap();
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_parse_error_auth() {
        assert!(matches!(
            HttpTransport::parse_error(401, None, ""),
            ApiError::AuthenticationFailed
        ));
        assert!(matches!(
            HttpTransport::parse_error(403, None, "forbidden"),
            ApiError::AuthenticationFailed
        ));
    }

    #[test]
    fn test_parse_error_rate_limited() {
        assert!(matches!(
            HttpTransport::parse_error(429, Some(12), ""),
            ApiError::RateLimited(12)
        ));
        assert!(matches!(
            HttpTransport::parse_error(429, None, ""),
            ApiError::RateLimited(60)
        ));
    }

    #[test]
    fn test_parse_error_server_message() {
        let body = r#"{"error":{"message":"overloaded","type":"server_error"}}"#;
        match HttpTransport::parse_error(503, None, body) {
            ApiError::ServerError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_raw_body() {
        match HttpTransport::parse_error(500, None, "<html>oops</html>") {
            ApiError::ServerError { message, .. } => assert_eq!(message, "<html>oops</html>"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
