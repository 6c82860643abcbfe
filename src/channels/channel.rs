//! The `Channel` trait: everything the dispatcher needs from a transport.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::pipeline::types::InboundMessage;

/// Stream of inbound messages produced by `Channel::start`.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// What the transport knows about a sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Profile name, when the sender has set one.
    pub display_name: Option<String>,
}

impl Contact {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
        }
    }

    /// Display name, or `fallback` when missing or blank.
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback)
    }
}

/// A messaging transport.
///
/// Connection setup, pairing and reconnection are the implementation's own
/// business; the dispatcher only sees these calls.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name ("whatsapp", "cli").
    fn name(&self) -> &str;

    /// Start receiving. May be called once.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a text message to a chat.
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;

    /// Look up the sender's profile.
    async fn get_contact(&self, sender: &str) -> Result<Contact, ChannelError>;

    /// Show the "typing..." indicator in a chat.
    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_or_falls_back_on_missing_or_blank() {
        assert_eq!(Contact::default().name_or("Cliente"), "Cliente");
        assert_eq!(Contact::named("   ").name_or("Cliente"), "Cliente");
        assert_eq!(Contact::named(" Maria ").name_or("Cliente"), "Maria");
    }
}
