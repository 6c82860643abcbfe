//! CLI channel: stdin/stdout REPL for trying the menu locally.
//!
//! Every line is a message from one configurable sender. A line starting with
//! `group:` is delivered as if it came from a group chat instead.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, Contact, MessageStream};
use crate::error::ChannelError;
use crate::pipeline::types::InboundMessage;

/// Sender used for `group:` lines.
const CLI_GROUP_ID: &str = "120363000000000000@g.us";

/// Default sender id when none is configured.
pub const DEFAULT_CLI_SENDER: &str = "5500000000000@c.us";

pub struct CliChannel {
    sender: String,
    display_name: Option<String>,
}

impl CliChannel {
    pub fn new(sender: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            sender: sender.into(),
            display_name,
        }
    }

    /// Build from `CLI_SENDER` / `CLI_DISPLAY_NAME`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let sender = lookup("CLI_SENDER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CLI_SENDER.to_string());
        let display_name = lookup("CLI_DISPLAY_NAME").filter(|s| !s.trim().is_empty());
        Self::new(sender, display_name)
    }

    /// Turn one input line into a message, or `None` for blank input.
    pub fn parse_line(&self, line: &str) -> Option<InboundMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let msg = match line.strip_prefix("group:") {
            Some(rest) => InboundMessage::new("cli", CLI_GROUP_ID, rest.trim()),
            None => InboundMessage::new("cli", &self.sender, line),
        };
        Some(msg)
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CLI_SENDER, None)
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let parser = CliChannel::new(self.sender.clone(), None);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(msg) = parser.parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        println!("\n[{recipient}]\n{text}\n");
        eprint!("> ");
        Ok(())
    }

    async fn get_contact(&self, _sender: &str) -> Result<Contact, ChannelError> {
        Ok(Contact {
            display_name: self.display_name.clone(),
        })
    }

    async fn send_typing(&self, _chat_id: &str) -> Result<(), ChannelError> {
        eprintln!("… typing");
        Ok(())
    }
}
