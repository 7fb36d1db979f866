//! Relay server and multiplexer
//!
//! One task owns the listening socket and the read half of every
//! connection. Each iteration it waits until either a new connection is
//! pending or some connection has produced a chunk, then handles exactly
//! that event under the shared state lock.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use futures_util::stream::{self, SelectAll, Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::RegistryFull;
use crate::router::BroadcastRouter;
use crate::state::{RelayState, SharedState};
use crate::transport;
use crate::types::ConnectionId;

/// Event produced by one connection's read half
#[derive(Debug)]
pub enum Inbound {
    /// A non-empty chunk, exactly as one read returned it
    Data(ConnectionId, Vec<u8>),
    /// Orderly close by the peer
    Closed(ConnectionId),
    /// Read error
    Failed(ConnectionId, io::Error),
}

type InboundStream = Abortable<Pin<Box<dyn Stream<Item = Inbound> + Send>>>;

/// Chunks read from one connection until it closes or fails
fn inbound_stream(
    id: ConnectionId,
    reader: OwnedReadHalf,
    chunk_size: usize,
) -> impl Stream<Item = Inbound> {
    stream::unfold(Some(reader), move |reader| async move {
        let mut reader = reader?;
        let mut buf = vec![0u8; chunk_size];
        match reader.read(&mut buf).await {
            Ok(0) => Some((Inbound::Closed(id), None)),
            Ok(n) => {
                buf.truncate(n);
                Some((Inbound::Data(id, buf), Some(reader)))
            }
            Err(e) => Some((Inbound::Failed(id, e), None)),
        }
    })
}

/// The relay server
pub struct RelayServer {
    listener: TcpListener,
    state: SharedState,
    router: BroadcastRouter,
    config: ServerConfig,
}

impl RelayServer {
    /// Bind the listening socket, with keepalive inherited by accepted peers
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = transport::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            state: Arc::new(Mutex::new(RelayState::new(config.capacity))),
            router: BroadcastRouter::default(),
            config,
        })
    }

    /// Replace the nickname-learning router
    pub fn with_router(mut self, router: BroadcastRouter) -> Self {
        self.router = router;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the shared state, for the admin console
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Run the multiplexer until accepting fails
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            "Relay listening on {} (max {} connections)",
            self.listener.local_addr()?,
            self.config.capacity
        );

        let mut inbound: SelectAll<InboundStream> = SelectAll::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(ServerError::Accept)?;
                    if let Some(reader) = self.admit(stream, peer).await {
                        inbound.push(reader);
                    }
                }
                Some(event) = inbound.next(), if !inbound.is_empty() => {
                    self.dispatch(event).await;
                }
            }
        }
    }

    /// Register a freshly accepted stream, or close it if the registry is full
    async fn admit(&self, stream: TcpStream, peer: SocketAddr) -> Option<InboundStream> {
        let (reader, writer) = stream.into_split();
        let (abort, registration) = AbortHandle::new_pair();

        let mut state = self.state.lock().await;
        let added = state.registry.add(peer, writer, abort);
        match added {
            Ok(id) => {
                info!(
                    "New connection from {} in slot {} ({}/{})",
                    peer,
                    id.slot,
                    state.registry.len(),
                    state.registry.capacity()
                );
                let chunks: Pin<Box<dyn Stream<Item = Inbound> + Send>> =
                    Box::pin(inbound_stream(id, reader, self.config.buffer_size));
                Some(Abortable::new(chunks, registration))
            }
            Err(RegistryFull(mut writer)) => {
                drop(state);
                warn!("Registry full, rejecting {}", peer);
                let _ = writer.shutdown().await;
                None
            }
        }
    }

    async fn dispatch(&self, event: Inbound) {
        let mut state = self.state.lock().await;
        match event {
            Inbound::Data(id, bytes) => {
                // The admin console may have removed it since the read completed
                if !state.registry.contains(id) {
                    return;
                }
                debug!("Connection {}: {}", id, String::from_utf8_lossy(&bytes));

                let report = self.router.forward(&mut *state, id, &bytes).await;
                for failed in report.failed {
                    state.disconnect(failed).await;
                }
            }
            Inbound::Closed(id) => {
                debug!("Connection {} closed by peer", id);
                state.disconnect(id).await;
            }
            Inbound::Failed(id, e) => {
                debug!("Read from {} failed: {}", id, e);
                state.disconnect(id).await;
            }
        }
    }
}
