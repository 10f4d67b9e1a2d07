use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    broadcaster::Broadcaster, message::ServerMessage, registry::SessionRegistry,
    session::ConnectionId,
};

/// Shared handles every task needs: the registry and the broadcast publisher.
#[derive(Debug, Clone)]
pub struct Hub {
    registry: Arc<SessionRegistry>,
    broadcaster: Broadcaster,
}

impl Hub {
    pub fn new(registry: Arc<SessionRegistry>, broadcaster: Broadcaster) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The one way a session ends.
    ///
    /// Safe to call from any number of places at once: whoever removes the
    /// session from the registry announces the departure and cancels the
    /// session, which makes its writer send the farewell line and close the
    /// stream. Every other call returns `false` and does nothing.
    pub async fn teardown(&self, id: ConnectionId) -> bool {
        self.end_session(id, true).await
    }

    /// Teardown without the `left the server` announcement, for when the
    /// whole server is going away.
    pub async fn dismiss(&self, id: ConnectionId) -> bool {
        self.end_session(id, false).await
    }

    async fn end_session(&self, id: ConnectionId, announce: bool) -> bool {
        let Some(session) = self.registry.remove(id).await else {
            return false;
        };

        match session.name() {
            Some(name) => {
                info!(conn = id, name, "session left");
                if announce {
                    self.broadcaster.publish(ServerMessage::Left {
                        name: name.to_string(),
                    });
                }
            }
            None => debug!(conn = id, "unauthenticated session closed"),
        }

        session.cancel();
        true
    }
}
