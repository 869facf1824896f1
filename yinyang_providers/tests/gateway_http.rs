//! HTTP-level tests for the completion gateway against a mock endpoint.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yinyang_core::{ChatMessage, CompletionGateway, Credential, CredentialPolicy, FailureKind, Role};
use yinyang_providers::{GatewayConfig, HttpGateway};

fn credential() -> Credential {
    CredentialPolicy::default()
        .validate(&format!("sk-{}", "x".repeat(40)))
        .unwrap()
}

fn gateway_for(server: &MockServer) -> HttpGateway {
    HttpGateway::new(GatewayConfig {
        endpoint: format!("{}/chat/completions", server.uri()),
        probe_timeout: Duration::from_millis(300),
        request_timeout: Duration::from_millis(300),
        ..GatewayConfig::default()
    })
}

fn reply_body(text: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}],
        "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
    })
}

async fn mount_status(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn complete_sends_role_content_pairs_and_returns_reply() {
    let server = MockServer::start().await;
    let key = credential();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", format!("Bearer {}", key.expose()).as_str()))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "model": "deepseek-chat",
            "max_tokens": 2000,
            "stream": false,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("hi")))
        .expect(1)
        .mount(&server)
        .await;

    let messages = vec![
        ChatMessage::new(Role::System, "be brief"),
        ChatMessage::new(Role::User, "hello"),
    ];
    let completion = gateway_for(&server)
        .complete(&key, &messages, "deepseek-chat", 2000)
        .await
        .unwrap();

    assert_eq!(completion.reply_text, "hi");
    assert_eq!(completion.raw["usage"]["total_tokens"], 4);

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = requests[0].body_json().unwrap();
    for message in sent["messages"].as_array().unwrap() {
        let keys: Vec<&String> = message.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2, "only role and content are transmitted");
    }
    assert!((sent["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn probe_is_minimal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "test"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body(".")))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = gateway_for(&server)
        .test_connection(&credential(), "deepseek-chat")
        .await;

    assert!(outcome.is_ok());
}

#[tokio::test]
async fn http_statuses_are_classified() {
    let cases = [
        (401, FailureKind::InvalidCredential),
        (402, FailureKind::QuotaExhausted),
        (429, FailureKind::RateLimited),
        (400, FailureKind::BadRequest),
        (422, FailureKind::BadRequest),
        (500, FailureKind::ServerError),
        (503, FailureKind::ServerError),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        mount_status(
            &server,
            status,
            json!({"error": {"message": format!("status {status}")}}),
        )
        .await;

        let failure = gateway_for(&server)
            .test_connection(&credential(), "deepseek-chat")
            .await
            .unwrap_err();

        assert_eq!(failure.kind, expected, "status {status}");
        assert_eq!(failure.http_status, Some(status));
        assert_eq!(failure.detail, format!("status {status}"));
    }
}

#[tokio::test]
async fn no_automatic_retry_on_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let failure = gateway_for(&server)
        .complete(
            &credential(),
            &[ChatMessage::new(Role::User, "hello")],
            "deepseek-chat",
            16,
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::ServerError);
}

#[tokio::test]
async fn malformed_success_body_is_bad_request() {
    let server = MockServer::start().await;
    mount_status(&server, 200, json!({"choices": []})).await;

    let failure = gateway_for(&server)
        .complete(
            &credential(),
            &[ChatMessage::new(Role::User, "hello")],
            "deepseek-chat",
            16,
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::BadRequest);
    assert_eq!(failure.detail, "malformed response");
}

#[tokio::test]
async fn slow_endpoint_is_a_timeout_not_a_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply_body("late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let failure = gateway_for(&server)
        .test_connection(&credential(), "deepseek-chat")
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.http_status, None);
    assert_eq!(failure.detail, "no response within 300ms");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    let gateway = HttpGateway::new(GatewayConfig::default())
        .with_endpoint("http://127.0.0.1:9/chat/completions");

    let failure = gateway
        .test_connection(&credential(), "deepseek-chat")
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::NetworkError);
}
