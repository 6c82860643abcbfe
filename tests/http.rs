//! Integration tests for the HTTP surface.
//!
//! Each test serves the real router on a random port and talks to it with
//! reqwest.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use menu_responder::channels::{Channel, WhatsAppChannel, WhatsAppConfig};
use menu_responder::pipeline::types::SenderScope;
use menu_responder::server::{ServerState, health_routes};
use menu_responder::store::{ContactLog, MemoryStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return its base URL.
async fn serve(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn start_server(contacts: Arc<ContactLog>) -> (String, WhatsAppChannel) {
    // Bridge URL is never contacted by these tests.
    let whatsapp = WhatsAppChannel::new(WhatsAppConfig::new("http://127.0.0.1:9")).unwrap();
    let app = health_routes(ServerState {
        bot_name: "DeBocaOnBoca".into(),
        channel: whatsapp.name().to_string(),
        contacts,
    })
    .merge(whatsapp.router());

    (serve(app).await, whatsapp)
}

fn empty_log() -> Arc<ContactLog> {
    Arc::new(ContactLog::new(Arc::new(MemoryStore::default())))
}

#[tokio::test]
async fn index_reports_running() {
    let (base, _wa) = start_server(empty_log()).await;

    let body = reqwest::get(format!("{base}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, "Servidor está rodando! Chatbot WhatsApp DeBocaOnBoca.");
}

#[tokio::test]
async fn health_counts_contacts() {
    let contacts = empty_log();
    contacts.register("5511", "Ana").await.unwrap();
    contacts.register("5521", "Bia").await.unwrap();
    let (base, _wa) = start_server(contacts).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["channel"], "whatsapp");
    assert_eq!(json["contacts"], 2);
}

#[tokio::test]
async fn webhook_feeds_the_message_stream() {
    let (base, wa) = start_server(empty_log()).await;
    let mut stream = wa.start().await.unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{base}/webhook/whatsapp"))
        .json(&serde_json::json!({
            "id": "wamid.1",
            "from": "5511999999999@c.us",
            "body": "oi",
            "timestamp": 1_700_000_000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    let msg = timeout(TEST_TIMEOUT, stream.next())
        .await
        .expect("no message within timeout")
        .unwrap();
    assert_eq!(msg.id, "wamid.1");
    assert_eq!(msg.sender, "5511999999999@c.us");
    assert_eq!(msg.body, "oi");
    assert_eq!(msg.scope, SenderScope::Individual);
}

#[tokio::test]
async fn webhook_skips_own_messages() {
    let (base, wa) = start_server(empty_log()).await;
    let mut stream = wa.start().await.unwrap();
    let client = reqwest::Client::new();

    let own = client
        .post(format!("{base}/webhook/whatsapp"))
        .json(&serde_json::json!({
            "from": "5511999999999@c.us",
            "body": "Olá! sou o assistente",
            "fromMe": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(own.status(), 200);

    client
        .post(format!("{base}/webhook/whatsapp"))
        .json(&serde_json::json!({ "from": "120363025555555555@g.us", "text": "1" }))
        .send()
        .await
        .unwrap();

    // Only the group message arrives; the bot's own echo never does.
    let msg = timeout(TEST_TIMEOUT, stream.next()).await.unwrap().unwrap();
    assert_eq!(msg.body, "1");
    assert_eq!(msg.scope, SenderScope::Group);
}

#[tokio::test]
async fn webhook_rejects_malformed_payloads() {
    let (base, _wa) = start_server(empty_log()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/webhook/whatsapp"))
        .json(&serde_json::json!({ "body": "no sender" }))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn health_is_readable_cross_origin() {
    let (base, _wa) = start_server(empty_log()).await;

    let resp = reqwest::Client::new()
        .get(format!("{base}/health"))
        .header("Origin", "https://status.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
