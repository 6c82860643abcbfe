//! Bot runner: drains a channel's message stream into the dispatcher.
//!
//! Each message is handled on its own task, so a slow reply to one sender
//! does not hold up another. Messages from the same sender are chained and run
//! in arrival order. Failures are logged here and go no further.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::channels::{Channel, MessageStream};
use crate::error::ChannelError;
use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::types::{DispatchOutcome, InboundMessage};

/// Max characters of a message body written to the log.
const LOG_PREVIEW_CHARS: usize = 50;

pub struct Bot {
    channel: Arc<dyn Channel>,
    dispatcher: Arc<Dispatcher>,
}

impl Bot {
    pub fn new(channel: Arc<dyn Channel>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            channel,
            dispatcher,
        }
    }

    /// Start the channel and handle messages until its stream ends.
    pub async fn run(&self) -> Result<(), ChannelError> {
        let stream = self.channel.start().await?;
        info!(channel = self.channel.name(), "Bot started");
        self.run_stream(stream).await;
        info!(channel = self.channel.name(), "Message stream ended, bot stopping");
        Ok(())
    }

    /// Handle every message from `stream`, then wait for in-flight handlers.
    pub async fn run_stream(&self, mut stream: MessageStream) {
        let mut in_flight = JoinSet::new();
        // Completion signal of the latest handler per sender.
        let mut tails: HashMap<String, oneshot::Receiver<()>> = HashMap::new();

        while let Some(message) = stream.next().await {
            let (done_tx, done_rx) = oneshot::channel();
            let previous = tails.insert(message.sender.clone(), done_rx);
            let dispatcher = Arc::clone(&self.dispatcher);

            in_flight.spawn(async move {
                if let Some(previous) = previous {
                    // An error only means the earlier handler panicked.
                    let _ = previous.await;
                }
                let outcome = process(&dispatcher, message).await;
                let _ = done_tx.send(());
                outcome
            });

            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }
            tails.retain(|_, done| matches!(done.try_recv(), Err(TryRecvError::Empty)));
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
    }
}

fn log_join(joined: Result<Option<DispatchOutcome>, tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Message handler panicked");
    }
}

/// Handle one message, logging the outcome and elapsed time.
///
/// Returns `None` when the message failed.
pub async fn process(dispatcher: &Dispatcher, message: InboundMessage) -> Option<DispatchOutcome> {
    let started = Instant::now();
    debug!(
        id = %message.id,
        sender = %message.sender,
        body = %preview(&message.body),
        "Received message"
    );

    match dispatcher.handle(&message).await {
        Ok(outcome) => {
            if outcome != DispatchOutcome::Ignored {
                info!(
                    id = %message.id,
                    sender = %message.sender,
                    outcome = outcome.label(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Message handled"
                );
            }
            Some(outcome)
        }
        Err(e) => {
            error!(
                id = %message.id,
                sender = %message.sender,
                error = %e,
                "Failed to handle message"
            );
            None
        }
    }
}

/// Single-line, length-capped body for logs.
pub fn preview(body: &str) -> String {
    let flat: String = body
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    if flat.chars().count() > LOG_PREVIEW_CHARS {
        let cut: String = flat.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
