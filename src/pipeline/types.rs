//! Shared types for the message pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Sender scope ────────────────────────────────────────────────────

/// What kind of chat a sender identifier points at.
///
/// Only `Individual` senders are eligible for replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderScope {
    /// One-to-one chat (`<number>@c.us`, `<number>@s.whatsapp.net`).
    Individual,
    /// Group chat (`<id>@g.us`).
    Group,
    /// Broadcast list or status feed (`...@broadcast`).
    Broadcast,
    /// Anything we do not recognize.
    Unknown,
}

/// Suffixes that mark a one-to-one chat.
const INDIVIDUAL_SUFFIXES: &[&str] = &["@c.us", "@s.whatsapp.net"];

impl SenderScope {
    /// Derive the scope from a transport sender identifier.
    pub fn from_sender_id(sender_id: &str) -> Self {
        if INDIVIDUAL_SUFFIXES.iter().any(|s| sender_id.ends_with(s)) {
            Self::Individual
        } else if sender_id.ends_with("@g.us") {
            Self::Group
        } else if sender_id.ends_with("@broadcast") {
            Self::Broadcast
        } else {
            Self::Unknown
        }
    }

    pub fn is_individual(&self) -> bool {
        matches!(self, Self::Individual)
    }
}

/// Strip the transport suffix from a sender identifier.
///
/// `"5511999999999@c.us"` → `"5511999999999"`. Identifiers without a suffix
/// come back unchanged.
pub fn normalize_sender_id(sender_id: &str) -> &str {
    sender_id.split('@').next().unwrap_or(sender_id)
}

// ── Inbound message ─────────────────────────────────────────────────

/// One inbound chat message, as delivered by a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel-native message id (or a generated UUID).
    pub id: String,
    /// Source channel name ("whatsapp", "cli").
    pub channel: String,
    /// Full transport sender identifier, suffix included.
    pub sender: String,
    /// Raw message text.
    pub body: String,
    /// Scope derived from `sender` by the channel adapter.
    pub scope: SenderScope,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Build a message, deriving the scope from the sender suffix.
    pub fn new(channel: &str, sender: &str, body: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
            scope: SenderScope::from_sender_id(sender),
            received_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Sender identifier with the transport suffix stripped.
    pub fn contact_id(&self) -> &str {
        normalize_sender_id(&self.sender)
    }
}

// ── Classification ──────────────────────────────────────────────────

/// What the classifier decided about one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// Present the greeting and menu.
    Greeting,
    /// The user picked a menu option.
    OptionSelect { option: String },
    /// Do nothing.
    Ignore,
}

impl Classification {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::OptionSelect { .. } => "option_select",
            Self::Ignore => "ignore",
        }
    }
}

// ── Dispatch outcome ────────────────────────────────────────────────

/// Observable result of dispatching one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No reply, no store access.
    Ignored,
    /// Greeting sent. `created` is true when a new record was stored.
    Greeted { contact_id: String, created: bool },
    /// Option reply sent.
    OptionAnswered {
        contact_id: String,
        option: String,
        /// Whether the token is in the menu table.
        recognized: bool,
        /// Whether the choice was appended to an existing record.
        recorded: bool,
    },
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Greeted { .. } => "greeted",
            Self::OptionAnswered { .. } => "option_answered",
        }
    }
}
