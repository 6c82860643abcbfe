//! WhatsApp channel: talks to a WhatsApp Web bridge over HTTP.
//!
//! The bridge owns the browser session, QR pairing and reconnection. We only
//! use four of its endpoints:
//!
//! - `POST {bridge}/send` `{to, text}`
//! - `GET  {bridge}/contacts/{jid}` → `{pushname?, name?}`
//! - `POST {bridge}/typing` `{chatId}`
//! - `GET  {bridge}/status` → `{status, connected}`
//!
//! Inbound messages are pushed by the bridge to `POST /webhook/whatsapp`,
//! served from [`WhatsAppChannel::router`].

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::channels::{Channel, Contact, MessageStream};
use crate::config::parse_number;
use crate::error::{ChannelError, ConfigError};
use crate::pipeline::types::InboundMessage;

const CHANNEL_NAME: &str = "whatsapp";

/// Default bridge server URL.
const DEFAULT_BRIDGE_URL: &str = "http://localhost:3001";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Webhook path the bridge posts inbound messages to.
pub const WEBHOOK_PATH: &str = "/webhook/whatsapp";

/// Bridge connection settings.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub bridge_url: String,
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl WhatsAppConfig {
    pub fn new(bridge_url: impl Into<String>) -> Self {
        Self {
            bridge_url: bridge_url.into(),
            ..Default::default()
        }
    }

    /// Build from `WHATSAPP_BRIDGE_URL` / `WHATSAPP_TIMEOUT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bridge_url = lookup("WHATSAPP_BRIDGE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string());

        let timeout_secs = match lookup("WHATSAPP_TIMEOUT") {
            Some(raw) => parse_number::<u64>("WHATSAPP_TIMEOUT", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            bridge_url,
            timeout_secs,
        })
    }
}

// ── Bridge protocol ─────────────────────────────────────────────────

/// Inbound message as posted by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Bridge message id.
    #[serde(default)]
    pub id: Option<String>,
    /// Sender JID (`<number>@c.us`, `<id>@g.us`, ...).
    pub from: String,
    /// Message text.
    #[serde(alias = "text")]
    pub body: String,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Set for messages we sent ourselves.
    #[serde(default, rename = "fromMe")]
    pub from_me: bool,
}

impl WebhookMessage {
    /// Convert to a pipeline message. Our own outgoing messages map to `None`.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        if self.from_me {
            return None;
        }
        let mut msg = InboundMessage::new(CHANNEL_NAME, &self.from, &self.body);
        if let Some(id) = self.id {
            msg = msg.with_id(id);
        }
        if let Some(ts) = self.timestamp.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)) {
            msg = msg.with_received_at(ts);
        }
        Some(msg)
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default = "default_true")]
    success: bool,
    error: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ContactResponse {
    pushname: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    connected: bool,
}

// ── Channel ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct WebhookState {
    incoming_tx: mpsc::UnboundedSender<InboundMessage>,
}

/// WhatsApp transport backed by an HTTP bridge.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
    incoming_tx: mpsc::UnboundedSender<InboundMessage>,
    /// Receiver side of the webhook queue, taken once in `start()`.
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            client,
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.bridge_url.trim_end_matches('/'))
    }

    /// Router serving the bridge webhook. Merge it into the main app.
    pub fn router(&self) -> Router {
        let state = WebhookState {
            incoming_tx: self.incoming_tx.clone(),
        };
        Router::new()
            .route(WEBHOOK_PATH, post(webhook_handler))
            .with_state(state)
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client.post(self.url(path)).json(body).send().await
    }
}

async fn webhook_handler(
    State(state): State<WebhookState>,
    Json(payload): Json<WebhookMessage>,
) -> StatusCode {
    let from = payload.from.clone();
    let Some(msg) = payload.into_inbound() else {
        debug!(from = %from, "Skipping own message from bridge");
        return StatusCode::OK;
    };

    if state.incoming_tx.send(msg).is_err() {
        warn!(from = %from, "Webhook message dropped, message stream closed");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "start() already called".to_string(),
            })?;

        info!(bridge = %self.config.bridge_url, "WhatsApp channel listening for webhooks");

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        let send_failed = |reason: String| ChannelError::SendFailed {
            name: CHANNEL_NAME.to_string(),
            reason,
        };

        let resp = self
            .post_json("send", &serde_json::json!({ "to": recipient, "text": text }))
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("bridge returned {status}: {body}")));
        }

        // A 2xx means delivered unless the body explicitly says otherwise.
        let body = resp.text().await.unwrap_or_default();
        if !body.trim().is_empty() {
            match serde_json::from_str::<SendResponse>(&body) {
                Ok(parsed) if !parsed.success => {
                    return Err(send_failed(
                        parsed.error.unwrap_or_else(|| "bridge reported failure".to_string()),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(to = %recipient, error = %e, "Send response is not JSON, trusting status code");
                }
            }
        }

        debug!(to = %recipient, "WhatsApp message sent");
        Ok(())
    }

    async fn get_contact(&self, sender: &str) -> Result<Contact, ChannelError> {
        let lookup_failed = |reason: String| ChannelError::ContactLookupFailed {
            name: CHANNEL_NAME.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(self.url(&format!("contacts/{sender}")))
            .send()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(lookup_failed(format!("bridge returned {status}")));
        }

        let parsed: ContactResponse = resp
            .json()
            .await
            .map_err(|e| lookup_failed(format!("invalid contact response: {e}")))?;

        Ok(Contact {
            display_name: parsed.pushname.or(parsed.name),
        })
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        let resp = self
            .post_json("typing", &serde_json::json!({ "chatId": chat_id }))
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ChannelError::Http(format!(
                "typing indicator rejected: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let unhealthy = || ChannelError::HealthCheckFailed {
            name: CHANNEL_NAME.to_string(),
        };

        let status: StatusResponse = self
            .client
            .get(self.url("status"))
            .send()
            .await
            .map_err(|_| unhealthy())?
            .json()
            .await
            .map_err(|_| unhealthy())?;

        if status.connected || status.status == "connected" {
            Ok(())
        } else {
            debug!(status = %status.status, "WhatsApp bridge not connected");
            Err(unhealthy())
        }
    }
}
