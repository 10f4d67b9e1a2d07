//! Serialized fan-out of public and system messages.
//!
//! Publishers push onto one unbounded channel; a single consumer task drains
//! it in publish order and copies each message into the mailbox of every
//! session logged in at that moment. Mailboxes are bounded, so a session that
//! cannot keep up is torn down instead of stalling everybody else.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::MailboxError, hub::Hub, message::ServerMessage};

#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<String>,
}

/// The consuming end of the broadcast channel.
#[derive(Debug)]
pub struct BroadcastFeed {
    rx: mpsc::UnboundedReceiver<String>,
}

pub fn channel() -> (Broadcaster, BroadcastFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Broadcaster { tx }, BroadcastFeed { rx })
}

impl Broadcaster {
    pub fn publish(&self, message: ServerMessage) {
        if let Err(error) = self.tx.send(message.to_string()) {
            warn!(message = %error.0, "broadcast feed is gone, dropping message");
        }
    }
}

impl BroadcastFeed {
    /// Drains the feed until `shutdown` fires or every publisher is gone.
    pub async fn run(mut self, hub: Hub, shutdown: CancellationToken) {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.rx.recv() => next,
            };
            let Some(message) = next else { break };
            fan_out(&hub, &message).await;
        }
        debug!("broadcaster stopped");
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

async fn fan_out(hub: &Hub, message: &str) {
    let recipients = hub.registry().snapshot().await;
    let mut slow = Vec::new();

    for session in &recipients {
        match session.deliver(message) {
            Ok(()) => {}
            Err(MailboxError::Full) => slow.push(session.id()),
            // Already being torn down.
            Err(MailboxError::Closed) => {}
        }
    }

    for id in slow {
        info!(conn = id, "mailbox full, disconnecting slow session");
        hub.teardown(id).await;
    }
}
