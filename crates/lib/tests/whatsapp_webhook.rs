//! Integration tests: webhook POSTs against a running gateway.
//!
//! The runtime URL points at a closed port, so message handling exercises the
//! fallback reply path; signature checks and status callbacks never reach the
//! runtime at all.

use lib::agent::thread_id_for;
use lib::config::Config;
use lib::gateway::{self, WEBHOOK_PATH};
use lib::signature::RequestValidator;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH_TOKEN: &str = "test-auth-token";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Start a gateway with test credentials and an unreachable runtime; returns
/// the port once the health probe answers.
async fn start_gateway() -> u16 {
    start_gateway_with_runtime(format!("http://127.0.0.1:{}", free_port())).await
}

/// Start a gateway pointed at the given runtime URL; returns the port once
/// the health probe answers.
async fn start_gateway_with_runtime(runtime_url: String) -> u16 {
    let port = free_port();
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.twilio.account_sid = Some("ACtest".to_string());
    config.twilio.auth_token = Some(AUTH_TOKEN.to_string());
    config.runtime.url = Some(runtime_url);

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let health = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(&health).send().await {
            if resp.status().is_success() {
                return port;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway did not come up on port {}", port);
}

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// POST a form to the webhook, signed for the gateway's local URL.
async fn post_signed(
    port: u16,
    params: &[(String, String)],
    auth_token: &str,
) -> reqwest::Response {
    let url = format!("http://127.0.0.1:{}{}", port, WEBHOOK_PATH);
    let signature = RequestValidator::new(auth_token).compute(&url, params);
    let body = serde_urlencoded::to_string(params).expect("encode form");
    reqwest::Client::new()
        .post(&url)
        .header("X-Twilio-Signature", signature)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .expect("send webhook")
}

#[tokio::test]
async fn unsigned_webhook_is_rejected() {
    let port = start_gateway().await;
    let url = format!("http://127.0.0.1:{}{}", port, WEBHOOK_PATH);
    let resp = reqwest::Client::new()
        .post(&url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("From=whatsapp%3A%2B14155550100&Body=hello")
        .send()
        .await
        .expect("send webhook");
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn wrongly_signed_webhook_is_rejected() {
    let port = start_gateway().await;
    let params = form(&[("From", "whatsapp:+14155550100"), ("Body", "hello")]);
    let resp = post_signed(port, &params, "some-other-token").await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn status_callback_returns_empty_response() {
    let port = start_gateway().await;
    let params = form(&[
        ("SmsSid", "SM123"),
        ("MessageStatus", "delivered"),
        ("To", "whatsapp:+14155550199"),
    ]);
    let resp = post_signed(port, &params, AUTH_TOKEN).await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("body");
    assert!(body.contains("<Response></Response>"));
    assert!(!body.contains("<Message>"));
}

#[tokio::test]
async fn message_gets_fallback_reply_when_runtime_unreachable() {
    let port = start_gateway().await;
    let params = form(&[
        ("MessageSid", "SM456"),
        ("From", "whatsapp:+14155550100"),
        ("Body", "hello there"),
        ("NumMedia", "0"),
    ]);
    let resp = post_signed(port, &params, AUTH_TOKEN).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/xml")
    );
    let body = resp.text().await.expect("body");
    assert!(body.starts_with("<?xml"));
    assert!(body.contains("<Message>"));
}

#[tokio::test]
async fn message_reply_is_rendered_as_twiml() {
    let runtime = MockServer::start().await;
    let sender = "whatsapp:+14155550100";
    Mock::given(method("POST"))
        .and(path(format!("/threads/{}/runs/wait", thread_id_for(sender))))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [
                { "role": "user", "content": "hello there" },
                { "role": "assistant", "content": "hi! how can I help?" }
            ]
        })))
        .expect(1)
        .mount(&runtime)
        .await;

    let port = start_gateway_with_runtime(runtime.uri()).await;
    let params = form(&[
        ("MessageSid", "SM789"),
        ("From", sender),
        ("Body", "hello there"),
        ("NumMedia", "0"),
    ]);
    let resp = post_signed(port, &params, AUTH_TOKEN).await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("body");
    assert!(body.contains("<Message>hi! how can I help?</Message>"));
}

#[tokio::test]
async fn signed_form_without_sender_is_bad_request() {
    let port = start_gateway().await;
    let params = form(&[("Body", "hello")]);
    let resp = post_signed(port, &params, AUTH_TOKEN).await;
    assert_eq!(resp.status(), 400);
}
