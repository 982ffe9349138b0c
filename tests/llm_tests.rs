// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatflow::chat::ChatSession;
use chatflow::config::Settings;
use chatflow::error::{ApiError, ChatError};
use chatflow::llm::message::{Conversation, Message, Role};
use chatflow::llm::providers::HttpTransport;
use chatflow::llm::sse::{delta_stream, parse_line, SseLine};
use chatflow::llm::tokens::{CharHeuristic, TokenEstimator};
use chatflow::llm::transport::{StreamRequest, Transport};

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        let chunk = json!({"choices": [{"delta": {"content": delta}}]});
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mock_endpoint(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(template)
        .mount(server)
        .await;
}

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::new(format!("{}/v1/chat/completions", server.uri()))
}

#[test]
fn test_message_user_creation() {
    let message = Message::user("Hello, world!");
    assert_eq!(message.role, Role::User);
    assert_eq!(message.content, "Hello, world!");
}

#[test]
fn test_conversation_in_progress_stays_last() {
    let mut conversation = Conversation::new();
    conversation.push(Message::user("question"));
    conversation.append_in_progress("partial");
    conversation.push(Message::system("late system note"));

    let last = conversation.messages().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "partial");

    let finished = conversation.finalize_in_progress();
    assert_eq!(finished.content, "partial");
    assert!(conversation.in_progress().is_none());
    assert_eq!(conversation.len(), 3);
}

#[test]
fn test_char_heuristic_estimate() {
    let estimator = CharHeuristic::default();
    let messages = vec![Message::user("abcdefgh"), Message::assistant("abc")];
    // ceil(8/4) + 4 + ceil(3/4) + 4
    assert_eq!(estimator.estimate(&messages), 11);
}

#[test]
fn test_parse_line_variants() {
    assert_eq!(
        parse_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
        SseLine::Delta("Hi".to_string())
    );
    assert_eq!(parse_line("data: [DONE]"), SseLine::Done);
    assert_eq!(parse_line(": keep-alive"), SseLine::Skip);
    assert_eq!(parse_line("data: {broken"), SseLine::Skip);
}

#[tokio::test]
async fn test_http_transport_streams_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({
            "stream": true,
            "model": "tiny",
            "session_id": "s-1",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hel", "lo"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server).with_api_key("sk-test");
    let request = StreamRequest::new(vec![Message::user("hi")])
        .with_session_id(Some("s-1".to_string()))
        .with_model(Some("tiny".to_string()));

    let lines = transport.open(request).await.unwrap();
    let deltas: Vec<String> = delta_stream(lines)
        .map(|delta| delta.unwrap())
        .collect()
        .await;

    assert_eq!(deltas, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_http_transport_auth_failure() {
    let server = MockServer::start().await;
    mock_endpoint(&server, ResponseTemplate::new(401)).await;

    let result = transport_for(&server)
        .open(StreamRequest::new(vec![Message::user("hi")]))
        .await;
    assert!(matches!(
        result,
        Err(ChatError::Api(ApiError::AuthenticationFailed))
    ));
}

#[tokio::test]
async fn test_http_transport_rate_limit_retry_after() {
    let server = MockServer::start().await;
    mock_endpoint(
        &server,
        ResponseTemplate::new(429).insert_header("retry-after", "12"),
    )
    .await;

    let result = transport_for(&server)
        .open(StreamRequest::new(vec![Message::user("hi")]))
        .await;
    assert!(matches!(
        result,
        Err(ChatError::Api(ApiError::RateLimited(12)))
    ));
}

#[tokio::test]
async fn test_http_transport_server_error_message() {
    let server = MockServer::start().await;
    mock_endpoint(
        &server,
        ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "model melted"}})),
    )
    .await;

    let result = transport_for(&server)
        .open(StreamRequest::new(vec![Message::user("hi")]))
        .await;
    match result {
        Err(ChatError::Api(ApiError::ServerError { status, message })) => {
            assert_eq!(status, 500);
            assert_eq!(message, "model melted");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[tokio::test]
async fn test_session_over_http_end_to_end() {
    let server = MockServer::start().await;
    mock_endpoint(
        &server,
        ResponseTemplate::new(200).set_body_raw(
            sse_body(&["The answer", " is 42", ".<|end|> ignored"]),
            "text/event-stream",
        ),
    )
    .await;

    let mut settings = Settings::default();
    settings.transport.endpoint = format!("{}/v1/chat/completions", server.uri());
    let session = ChatSession::builder(settings)
        .with_transport(Arc::new(transport_for(&server)))
        .build()
        .unwrap();

    assert!(session.submit("what is the answer?").await.unwrap());
    let done = session.wait_until_idle().await.unwrap();

    assert!(done.error.is_none());
    assert_eq!(done.messages.len(), 2);
    assert_eq!(done.messages[1].role, Role::Assistant);
    assert_eq!(done.messages[1].content, "The answer is 42.");
}

#[tokio::test]
async fn test_session_over_http_failure_keeps_user_message() {
    let server = MockServer::start().await;
    mock_endpoint(&server, ResponseTemplate::new(403)).await;

    let session = ChatSession::builder(Settings::default())
        .with_transport(Arc::new(transport_for(&server)))
        .build()
        .unwrap();

    session.submit("hi").await.unwrap();
    let done = session.wait_until_idle().await.unwrap();

    assert_eq!(done.messages.len(), 1);
    assert_eq!(done.messages[0].role, Role::User);
    assert!(done.error.unwrap().contains("Authentication failed"));
}
