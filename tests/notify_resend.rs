// tests/notify_resend.rs
use std::time::Duration;

use forum_digest::notify::resend::MAX_ATTEMPTS;
use forum_digest::notify::{EmailMessage, Mailer, ResendMailer};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn message() -> EmailMessage {
    EmailMessage {
        from: "V2EX Daily <digest@resend.dev>".into(),
        to: vec!["me@example.com".into()],
        subject: "📰 V2EX 每日精选 (10/18) - 3篇新帖".into(),
        html: "<p>digest</p>".into(),
    }
}

fn mailer(server: &MockServer) -> ResendMailer {
    ResendMailer::new("re_test".into())
        .with_api_base(&server.uri())
        .with_retries(3, Duration::from_millis(1))
}

#[tokio::test]
async fn sends_payload_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test"))
        .and(body_partial_json(json!({
            "from": "V2EX Daily <digest@resend.dev>",
            "to": ["me@example.com"],
            "html": "<p>digest</p>",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_123"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = mailer(&server).send(&message()).await.unwrap();
    assert_eq!(id, "msg_123");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_2"})))
        .mount(&server)
        .await;

    let id = mailer(&server).send(&message()).await.unwrap();
    assert_eq!(id, "msg_2");
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid from"))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer(&server).send(&message()).await.unwrap_err();
    assert!(err.to_string().contains("422"));
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    assert!(mailer(&server).send(&message()).await.is_err());
}

#[tokio::test]
async fn retry_count_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(u64::from(MAX_ATTEMPTS))
        .mount(&server)
        .await;

    let m = ResendMailer::new("re_test".into())
        .with_api_base(&server.uri())
        .with_retries(200, Duration::from_millis(1));
    let err = m.send(&message()).await.unwrap_err();
    assert!(err.to_string().contains("500"));
}
