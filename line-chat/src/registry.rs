use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::{
    error::{LoginError, RegistryError},
    mailbox::Mailbox,
    session::{ConnectionId, Session, SessionHandle},
};

/// Every live session, keyed by connection id.
///
/// Writers (register, login, remove) take the lock exclusively, readers
/// (lookup, snapshot) share it. Nothing here touches a socket, so the lock is
/// only ever held for map operations.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<ConnectionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        id: ConnectionId,
        mailbox: Mailbox,
    ) -> Result<SessionHandle, RegistryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateRegistration(id));
        }

        let session = Session::new(id, mailbox);
        let handle = session.handle();
        sessions.insert(id, session);
        Ok(handle)
    }

    /// Claims `name` for the session in one critical section, so of several
    /// racing claimants exactly one wins.
    pub async fn complete_login(&self, id: ConnectionId, name: &str) -> Result<(), LoginError> {
        let mut sessions = self.sessions.write().await;

        if sessions
            .values()
            .any(|session| session.name() == Some(name))
        {
            return Err(LoginError::NameTaken(name.to_string()));
        }

        let session = sessions.get_mut(&id).ok_or(LoginError::NotRegistered(id))?;
        if session.is_logged_in() {
            return Err(LoginError::AlreadyLoggedIn(id));
        }
        session.log_in(name.to_string());
        Ok(())
    }

    pub async fn lookup(&self, name: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .find(|session| session.name() == Some(name))
            .map(Session::handle)
    }

    /// Removes the session. Only the first call for an id gets it back.
    pub async fn remove(&self, id: ConnectionId) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id)
    }

    /// Logged-in sessions in connection order.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|session| session.is_logged_in())
            .map(Session::handle)
            .collect()
    }

    /// Every registered connection, logged in or not.
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        let sessions = self.sessions.read().await;
        sessions.keys().copied().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn logged_in_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|session| session.is_logged_in())
            .count()
    }
}
