use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    select,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    broadcaster,
    config::ServerConfig,
    connection,
    error::RegistryError,
    hub::Hub,
    mailbox::mailbox,
    message::ServerMessage,
    registry::SessionRegistry,
    session::ConnectionId,
};

/// The session core without any listener attached.
///
/// Owns the registry, the broadcaster task and connection id allocation.
/// Anything that yields a byte stream can be handed to [`ChatService::attach`].
pub struct ChatService {
    hub: Hub,
    config: ServerConfig,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl ChatService {
    /// Spawns the broadcaster, so this must run inside a Tokio runtime.
    pub fn start(config: ServerConfig) -> Self {
        let (broadcaster, feed) = broadcaster::channel();
        let hub = Hub::new(Arc::new(SessionRegistry::new()), broadcaster);
        let shutdown = CancellationToken::new();
        tokio::spawn(feed.run(hub.clone(), shutdown.clone()));

        Self {
            hub,
            config,
            next_id: AtomicU64::new(1),
            shutdown,
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Registers a new unauthenticated session for `stream` and starts its
    /// reader and writer tasks.
    pub async fn attach<S>(&self, stream: S) -> Result<ConnectionId, RegistryError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (mailbox, inbox) = mailbox(self.config.mailbox_capacity);
        let session = self.hub.registry().register(id, mailbox).await?;
        connection::spawn(self.hub.clone(), &self.config, session, inbox, stream);
        Ok(id)
    }

    /// Tells everyone the server is going away, closes every session and
    /// stops the broadcaster last.
    pub async fn shutdown(&self) {
        info!("chat server shutting down");

        for session in self.hub.registry().snapshot().await {
            let _ = session.deliver(ServerMessage::ShuttingDown);
        }
        for id in self.hub.registry().connection_ids().await {
            self.hub.dismiss(id).await;
        }
        self.shutdown.cancel();
    }
}

pub struct ChatServer {
    listener: TcpListener,
    service: Arc<ChatService>,
}

impl ChatServer {
    pub fn new(listener: TcpListener, config: ServerConfig) -> Self {
        Self {
            listener,
            service: Arc::new(ChatService::start(config)),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> Arc<ChatService> {
        Arc::clone(&self.service)
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let ChatServer { listener, service } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    service.shutdown().await;
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &service);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    service: &Arc<ChatService>,
) {
    match result {
        Ok((stream, peer)) => spawn_attach(stream, peer, service),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_attach(stream: TcpStream, peer: SocketAddr, service: &Arc<ChatService>) {
    let service = Arc::clone(service);
    tokio::spawn(async move {
        match service.attach(stream).await {
            Ok(id) => info!(conn = id, %peer, "connection accepted"),
            Err(err) => warn!(%peer, error = %err, "failed to register connection"),
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::{BufReader, DuplexStream, ReadHalf, WriteHalf},
        time::timeout,
    };

    use super::*;
    use crate::message::{read_line, write_line};

    struct Peer {
        reader: BufReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Peer {
        async fn attach(service: &ChatService) -> Self {
            Self::attach_with_buffer(service, 4096).await.1
        }

        async fn attach_with_buffer(service: &ChatService, size: usize) -> (ConnectionId, Self) {
            let (server_side, client_side) = tokio::io::duplex(size);
            let id = service.attach(server_side).await.expect("attach");
            let (reader, writer) = tokio::io::split(client_side);
            let peer = Self {
                reader: BufReader::new(reader),
                writer,
            };
            (id, peer)
        }

        async fn send(&mut self, line: &str) {
            write_line(&mut self.writer, line).await.expect("send line");
        }

        async fn next(&mut self) -> Option<String> {
            timeout(Duration::from_secs(1), read_line(&mut self.reader, 4096))
                .await
                .expect("timed out waiting for a line")
                .expect("read line")
        }
    }

    #[tokio::test]
    async fn attached_streams_chat_with_each_other() {
        let service = ChatService::start(ServerConfig::default());
        let mut alice = Peer::attach(&service).await;
        let mut bob = Peer::attach(&service).await;

        alice.send("/joinAs alice").await;
        assert_eq!(alice.next().await.as_deref(), Some("alice joined the server"));
        bob.send("/joinAs bob").await;
        assert_eq!(bob.next().await.as_deref(), Some("bob joined the server"));
        assert_eq!(alice.next().await.as_deref(), Some("bob joined the server"));

        bob.send("hi alice").await;
        assert_eq!(alice.next().await.as_deref(), Some("bob say: hi alice"));
        assert_eq!(bob.next().await.as_deref(), Some("bob say: hi alice"));
    }

    #[tokio::test]
    async fn quit_sends_farewell_and_closes() {
        let service = ChatService::start(ServerConfig::default());
        let mut alice = Peer::attach(&service).await;
        alice.send("/joinAs alice").await;
        alice.next().await;

        alice.send("/quit").await;
        assert_eq!(alice.next().await.as_deref(), Some("Connection closed!"));
        assert_eq!(alice.next().await, None);
        assert!(service.hub().registry().is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_notifies_and_clears_sessions() {
        let service = ChatService::start(ServerConfig::default());
        let mut alice = Peer::attach(&service).await;
        let mut lurker = Peer::attach(&service).await;
        alice.send("/joinAs alice").await;
        alice.next().await;

        service.shutdown().await;

        assert_eq!(alice.next().await.as_deref(), Some("Server is shutting down"));
        assert_eq!(alice.next().await.as_deref(), Some("Connection closed!"));
        assert_eq!(lurker.next().await.as_deref(), Some("Connection closed!"));
        assert!(service.hub().registry().is_empty().await);
    }

    #[tokio::test]
    async fn teardown_during_a_stalled_write_keeps_lines_whole() {
        let service = ChatService::start(ServerConfig::default());
        let (alice_id, mut alice) = Peer::attach_with_buffer(&service, 16).await;
        let mut bob = Peer::attach(&service).await;
        alice.send("/joinAs alice").await;
        assert_eq!(alice.next().await.as_deref(), Some("alice joined the server"));

        // Alice stops reading, so her writer stalls partway through this line.
        bob.send("/joinAs bob").await;
        assert_eq!(bob.next().await.as_deref(), Some("bob joined the server"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(service.hub().teardown(alice_id).await);

        assert_eq!(alice.next().await.as_deref(), Some("bob joined the server"));
        assert_eq!(alice.next().await.as_deref(), Some("Connection closed!"));
        assert_eq!(alice.next().await, None);
    }

    #[tokio::test]
    async fn shutdown_does_not_announce_departures() {
        let service = ChatService::start(ServerConfig::default());
        let mut alice = Peer::attach(&service).await;
        let mut bob = Peer::attach(&service).await;
        alice.send("/joinAs alice").await;
        alice.next().await;
        bob.send("/joinAs bob").await;
        bob.next().await;
        alice.next().await;

        service.shutdown().await;

        for peer in [&mut alice, &mut bob] {
            assert_eq!(peer.next().await.as_deref(), Some("Server is shutting down"));
            assert_eq!(peer.next().await.as_deref(), Some("Connection closed!"));
            assert_eq!(peer.next().await, None);
        }
    }
}
