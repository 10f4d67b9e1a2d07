use std::io;

use thiserror::Error;

use crate::session::ConnectionId;

/// Precondition violations raised by [`crate::registry::SessionRegistry::register`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateRegistration(ConnectionId),
}

/// Reasons a `/joinAs` attempt can be refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("name {0} is already taken")]
    NameTaken(String),
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),
    #[error("connection {0} has already joined")]
    AlreadyLoggedIn(ConnectionId),
}

/// Malformed commands. Reported to the sender, the connection stays open.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("wrong format for {0}")]
    Format(&'static str),
}

/// Private message could not be handed to its target.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("user {0} isn't online")]
    UserOffline(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MailboxError {
    #[error("mailbox is full")]
    Full,
    #[error("mailbox is closed")]
    Closed,
}

/// Transport-level failures. Every one of these ends the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] io::Error),
    #[error("protocol violation: {0}")]
    ProtocolViolation(Violation),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

impl From<Violation> for SessionError {
    fn from(violation: Violation) -> Self {
        SessionError::ProtocolViolation(violation)
    }
}
