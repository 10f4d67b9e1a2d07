//! Bounded per-session outbound queue.
//!
//! Producers (the router, other sessions, the broadcaster) never wait on a
//! mailbox: a full queue is reported as [`MailboxError::Full`] and the caller
//! decides what to do with the slow consumer.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::error::MailboxError;

pub const DEFAULT_CAPACITY: usize = 256;

/// Sending side of a session's mailbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<String>,
}

/// Receiving side, owned by the session's writer task.
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<String>,
}

pub fn mailbox(capacity: usize) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Mailbox { tx }, MailboxReceiver { rx })
}

impl Mailbox {
    pub fn deliver(&self, line: impl Into<String>) -> Result<(), MailboxError> {
        self.tx.try_send(line.into()).map_err(|err| match err {
            TrySendError::Full(_) => MailboxError::Full,
            TrySendError::Closed(_) => MailboxError::Closed,
        })
    }
}

impl MailboxReceiver {
    /// Waits for the next line. `None` once the mailbox is closed and drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Stops accepting new lines; already queued lines stay readable.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn try_recv(&mut self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}
