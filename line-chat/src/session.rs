use tokio_util::sync::CancellationToken;

use crate::{error::MailboxError, mailbox::Mailbox};

pub type ConnectionId = u64;

/// Server-side state for one connection. Owned by the registry.
///
/// `name` doubles as the login flag: it is `None` until `/joinAs` succeeds and
/// is only ever written under the registry's write lock.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    name: Option<String>,
    mailbox: Mailbox,
    cancel: CancellationToken,
}

impl Session {
    pub(crate) fn new(id: ConnectionId, mailbox: Mailbox) -> Self {
        Self {
            id,
            name: None,
            mailbox,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.name.is_some()
    }

    pub(crate) fn log_in(&mut self, name: String) {
        self.name = Some(name);
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            name: self.name.clone(),
            mailbox: self.mailbox.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Wakes the session's reader and writer tasks so they can exit.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// A copy of a session's identity and delivery endpoints, usable outside the
/// registry lock. The name reflects the moment the handle was taken.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ConnectionId,
    name: Option<String>,
    mailbox: Mailbox,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn deliver(&self, line: impl Into<String>) -> Result<(), MailboxError> {
        self.mailbox.deliver(line)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
