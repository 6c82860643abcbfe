//! Dispatcher: turns a classification into a reply and a contact-log update.
//!
//! - Greeting: look up the sender's name, send the menu, create the contact
//!   record if this is the first greeting.
//! - OptionSelect: send the canned reply, append the token to an existing
//!   record. An option never creates a record.
//! - Ignore: nothing.
//!
//! A failed send aborts the message before any store access. A failed store
//! write is logged and swallowed, since the user already has their reply.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::channels::Channel;
use crate::error::{ConfigError, DispatchError};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::menu::MenuConfig;
use crate::pipeline::types::{Classification, DispatchOutcome, InboundMessage, normalize_sender_id};
use crate::store::ContactLog;

/// Default pause before and after the typing indicator.
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(500);

pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    contacts: Arc<ContactLog>,
    menu: Arc<MenuConfig>,
    classifier: Classifier,
    typing_delay: Duration,
}

impl Dispatcher {
    /// Build a dispatcher; the classifier is derived from `menu`.
    pub fn new(
        channel: Arc<dyn Channel>,
        contacts: Arc<ContactLog>,
        menu: Arc<MenuConfig>,
    ) -> Result<Self, ConfigError> {
        let classifier = Classifier::from_menu(&menu)?;
        Ok(Self {
            channel,
            contacts,
            menu,
            classifier,
            typing_delay: DEFAULT_TYPING_DELAY,
        })
    }

    /// Set the pause around the typing indicator. Zero disables the pauses.
    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }

    /// Classify `message` and perform the matching side effects.
    pub async fn handle(&self, message: &InboundMessage) -> Result<DispatchOutcome, DispatchError> {
        match self.classifier.classify(message) {
            Classification::Greeting => self.greet(message).await,
            Classification::OptionSelect { option } => self.answer_option(message, &option).await,
            Classification::Ignore => Ok(DispatchOutcome::Ignored),
        }
    }

    /// Send the greeting menu and make sure the sender has a record.
    pub async fn greet(&self, message: &InboundMessage) -> Result<DispatchOutcome, DispatchError> {
        let contact_id = normalize_sender_id(&message.sender).to_string();

        self.show_typing(&message.sender).await;

        let display_name = self.resolve_name(&message.sender).await;
        let greeting = self.menu.render_greeting(&display_name);
        self.reply(&message.sender, &greeting).await?;

        info!(contact = %contact_id, name = %display_name, "Greeting sent");

        let created = match self.contacts.register(&contact_id, &display_name).await {
            Ok(created) => created,
            Err(e) => {
                error!(contact = %contact_id, error = %e, "Failed to persist new contact");
                false
            }
        };

        Ok(DispatchOutcome::Greeted {
            contact_id,
            created,
        })
    }

    /// Send the reply for `option` and log the choice on the sender's record.
    ///
    /// Tokens missing from the menu get the invalid-option reply and are never
    /// logged.
    pub async fn answer_option(
        &self,
        message: &InboundMessage,
        option: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let contact_id = normalize_sender_id(&message.sender).to_string();
        let recognized = self.menu.option(option).is_some();
        if !recognized {
            warn!(
                contact = %contact_id,
                option = %option,
                "Option token not in menu table, sending invalid-option reply"
            );
        }

        self.show_typing(&message.sender).await;
        self.reply(&message.sender, self.menu.reply_for(option)).await?;

        info!(contact = %contact_id, option = %option, recognized, "Option reply sent");

        let recorded = if recognized {
            match self.contacts.record_choice(&contact_id, option).await {
                Ok(recorded) => recorded,
                Err(e) => {
                    error!(contact = %contact_id, option = %option, error = %e, "Failed to log menu choice");
                    false
                }
            }
        } else {
            false
        };

        Ok(DispatchOutcome::OptionAnswered {
            contact_id,
            option: option.to_string(),
            recognized,
            recorded,
        })
    }

    /// Display name from the transport, or the configured fallback.
    async fn resolve_name(&self, sender: &str) -> String {
        match self.channel.get_contact(sender).await {
            Ok(contact) => contact.name_or(&self.menu.fallback_name).to_string(),
            Err(e) => {
                warn!(sender = %sender, error = %e, "Contact lookup failed, using fallback name");
                self.menu.fallback_name.clone()
            }
        }
    }

    /// Pause, show "typing...", pause. Failures only get logged.
    async fn show_typing(&self, chat_id: &str) {
        self.pause().await;
        if let Err(e) = self.channel.send_typing(chat_id).await {
            warn!(chat = %chat_id, error = %e, "Typing indicator failed");
        }
        self.pause().await;
    }

    async fn pause(&self) {
        if !self.typing_delay.is_zero() {
            tokio::time::sleep(self.typing_delay).await;
        }
    }

    async fn reply(&self, recipient: &str, text: &str) -> Result<(), DispatchError> {
        self.channel
            .send_message(recipient, text)
            .await
            .map_err(|source| DispatchError::ReplyFailed {
                recipient: recipient.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::channels::{Contact, MessageStream};
    use crate::error::ChannelError;
    use crate::store::{ContactRecord, MemoryStore};

    const SENDER: &str = "5511999999999@c.us";

    /// Channel double that records every call.
    #[derive(Default)]
    struct RecordingChannel {
        sent: StdMutex<Vec<(String, String)>>,
        typing: StdMutex<Vec<String>>,
        name: Option<String>,
        fail_sends: AtomicBool,
        fail_typing: bool,
        fail_lookup: bool,
    }

    impl RecordingChannel {
        fn named(name: &str) -> Self {
            Self {
                name: Some(name.to_string()),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(ChannelError::SendFailed {
                    name: "recording".into(),
                    reason: "offline".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), text.to_string()));
            Ok(())
        }

        async fn get_contact(&self, _sender: &str) -> Result<Contact, ChannelError> {
            if self.fail_lookup {
                return Err(ChannelError::ContactLookupFailed {
                    name: "recording".into(),
                    reason: "unknown".into(),
                });
            }
            Ok(Contact {
                display_name: self.name.clone(),
            })
        }

        async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
            if self.fail_typing {
                return Err(ChannelError::Http("typing rejected".into()));
            }
            self.typing.lock().unwrap().push(chat_id.to_string());
            Ok(())
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        channel: Arc<RecordingChannel>,
        store: Arc<MemoryStore>,
    }

    fn harness_with(channel: RecordingChannel, menu: MenuConfig) -> Harness {
        let channel = Arc::new(channel);
        let store = Arc::new(MemoryStore::new());
        let contacts = Arc::new(ContactLog::new(store.clone()));
        let dispatcher = Dispatcher::new(channel.clone(), contacts, Arc::new(menu))
            .unwrap()
            .with_typing_delay(Duration::ZERO);
        Harness {
            dispatcher,
            channel,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingChannel::named("Maria Souza"), MenuConfig::default())
    }

    fn msg(sender: &str, body: &str) -> InboundMessage {
        InboundMessage::new("test", sender, body)
    }

    #[tokio::test]
    async fn greeting_sends_menu_and_creates_record() {
        let h = harness();
        let outcome = h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Greeted {
                contact_id: "5511999999999".into(),
                created: true
            }
        );

        let sent = h.channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, SENDER);
        assert_eq!(sent[0].1, MenuConfig::default().render_greeting("Maria"));

        assert_eq!(
            h.store.snapshot().await,
            vec![ContactRecord::new("5511999999999", "Maria Souza")]
        );
    }

    #[tokio::test]
    async fn second_greeting_does_not_duplicate() {
        let h = harness();
        h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        let outcome = h.dispatcher.handle(&msg(SENDER, "Bom dia")).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Greeted { created: false, .. }));
        assert_eq!(h.channel.sent().len(), 2);
        assert_eq!(h.store.snapshot().await.len(), 1);
        assert_eq!(h.store.save_count(), 1);
    }

    #[tokio::test]
    async fn fallback_name_when_contact_has_none() {
        let h = harness_with(RecordingChannel::default(), MenuConfig::default());
        h.dispatcher.handle(&msg(SENDER, "menu")).await.unwrap();

        assert!(h.channel.sent()[0].1.starts_with("Olá! Cliente,"));
        assert_eq!(h.store.snapshot().await[0].display_name, "Cliente");
    }

    #[tokio::test]
    async fn fallback_name_when_lookup_fails() {
        let channel = RecordingChannel {
            fail_lookup: true,
            ..RecordingChannel::named("ignored")
        };
        let h = harness_with(channel, MenuConfig::default());
        h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        assert_eq!(h.store.snapshot().await[0].display_name, "Cliente");
    }

    #[tokio::test]
    async fn option_after_greeting_is_logged() {
        let h = harness();
        h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        let outcome = h.dispatcher.handle(&msg(SENDER, "2")).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::OptionAnswered {
                contact_id: "5511999999999".into(),
                option: "2".into(),
                recognized: true,
                recorded: true,
            }
        );
        assert_eq!(h.channel.sent()[1].1, MenuConfig::default().reply_for("2"));
        assert_eq!(h.store.snapshot().await[0].chosen_options, ["2"]);
    }

    #[tokio::test]
    async fn option_without_record_creates_nothing() {
        let h = harness();
        let outcome = h.dispatcher.handle(&msg(SENDER, "4")).await.unwrap();

        assert!(matches!(
            outcome,
            DispatchOutcome::OptionAnswered { recorded: false, recognized: true, .. }
        ));
        assert_eq!(h.channel.sent().len(), 1);
        assert!(h.store.snapshot().await.is_empty());
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test]
    async fn unknown_token_gets_invalid_reply_and_is_not_logged() {
        let h = harness();
        h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        let outcome = h
            .dispatcher
            .answer_option(&msg(SENDER, "42"), "42")
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DispatchOutcome::OptionAnswered { recognized: false, recorded: false, .. }
        ));
        assert_eq!(h.channel.sent()[1].1, "Opção inválida.");
        assert!(h.store.snapshot().await[0].chosen_options.is_empty());
    }

    #[tokio::test]
    async fn group_messages_do_nothing() {
        let h = harness();
        for body in ["oi", "1"] {
            let outcome = h
                .dispatcher
                .handle(&msg("120363025246125486@g.us", body))
                .await
                .unwrap();
            assert_eq!(outcome, DispatchOutcome::Ignored);
        }
        assert!(h.channel.sent().is_empty());
        assert!(h.channel.typing.lock().unwrap().is_empty());
        assert_eq!(h.store.load_count(), 0);
    }

    #[tokio::test]
    async fn send_failure_skips_store() {
        let h = harness();
        h.channel.fail_sends.store(true, Ordering::SeqCst);

        let err = h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap_err();
        assert!(matches!(err, DispatchError::ReplyFailed { .. }));
        assert_eq!(h.store.load_count(), 0);
        assert!(h.store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn store_failure_does_not_block_reply() {
        let h = harness();
        h.store.fail_saves(true);

        let outcome = h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Greeted { created: false, .. }));
        assert_eq!(h.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn typing_failure_does_not_block_reply() {
        let channel = RecordingChannel {
            fail_typing: true,
            ..RecordingChannel::named("Ana")
        };
        let h = harness_with(channel, MenuConfig::default());
        h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        assert_eq!(h.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn typing_indicator_precedes_each_reply() {
        let h = harness();
        h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        h.dispatcher.handle(&msg(SENDER, "1")).await.unwrap();
        assert_eq!(*h.channel.typing.lock().unwrap(), [SENDER, SENDER]);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_pauses_use_configured_delay() {
        let h = harness();
        let dispatcher = h.dispatcher.with_typing_delay(Duration::from_millis(500));
        let started = tokio::time::Instant::now();
        dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn seven_on_five_option_menu_is_ignored() {
        let mut menu = MenuConfig::default();
        menu.options.truncate(5);
        let h = harness_with(RecordingChannel::named("Ana"), menu);

        h.dispatcher.handle(&msg(SENDER, "oi")).await.unwrap();
        let outcome = h.dispatcher.handle(&msg(SENDER, "7")).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(h.channel.sent().len(), 1);
        assert!(h.store.snapshot().await[0].chosen_options.is_empty());
    }
}
