//! Shared relay state
//!
//! The registry and the nickname table behind one lock. The multiplexer and
//! the admin console both go through `SharedState`, and every structural
//! change (add, remove, nickname write or erase) happens while holding it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::nickname::NicknameTable;
use crate::registry::ConnectionRegistry;
use crate::types::ConnectionId;

/// State shared between the multiplexer and the admin console
pub type SharedState = Arc<Mutex<RelayState<OwnedWriteHalf>>>;

/// Result of an operator kick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KickOutcome {
    /// The connection was notified, closed and its slot freed
    Kicked { id: ConnectionId, peer: SocketAddr },
    /// No live connection goes by that name
    NotFound,
}

/// One row of the operator's connection listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub nickname: Option<String>,
}

/// Registry plus nickname table
#[derive(Debug)]
pub struct RelayState<H> {
    pub registry: ConnectionRegistry<H>,
    pub nicknames: NicknameTable,
}

impl<H> RelayState<H> {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: ConnectionRegistry::with_capacity(capacity),
            nicknames: NicknameTable::new(),
        }
    }

    /// Snapshot of active connections in slot order
    pub fn list(&self) -> Vec<ConnectionInfo> {
        self.registry
            .iter()
            .map(|c| ConnectionInfo {
                id: c.id,
                peer: c.peer,
                nickname: c.nickname.clone(),
            })
            .collect()
    }
}

impl<H> RelayState<H>
where
    H: AsyncWrite + Unpin,
{
    /// Tear down one connection: free its slot, forget its names and close it
    ///
    /// Returns false if `id` no longer owns its slot.
    pub async fn disconnect(&mut self, id: ConnectionId) -> bool {
        let Some(conn) = self.registry.remove(id) else {
            return false;
        };
        self.nicknames.forget(id);

        let peer = conn.peer;
        let mut handle = conn.into_handle();
        if let Err(e) = handle.shutdown().await {
            debug!("Shutdown of {} ({}) failed: {}", id, peer, e);
        }

        info!(
            "Connection {} ({}) closed, {}/{} slots in use",
            id,
            peer,
            self.registry.len(),
            self.registry.capacity()
        );
        true
    }

    /// Notify, close and remove the connection known as `name`
    pub async fn kick(&mut self, name: &str, notice: &[u8]) -> KickOutcome {
        let Some(id) = self.nicknames.lookup(name) else {
            return KickOutcome::NotFound;
        };

        let Some(conn) = self.registry.remove(id) else {
            // Stale entry left behind by a connection that already went away
            self.nicknames.erase(name);
            return KickOutcome::NotFound;
        };
        self.nicknames.forget(id);

        let peer = conn.peer;
        let mut handle = conn.into_handle();
        if let Err(e) = handle.write_all(notice).await {
            debug!("Kick notice to {} failed: {}", id, e);
        }
        if let Err(e) = handle.shutdown().await {
            debug!("Shutdown of {} failed: {}", id, e);
        }

        info!("Kicked '{}' ({} at {})", name, id, peer);
        KickOutcome::Kicked { id, peer }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use futures_util::future::AbortHandle;

    /// In-memory write handle that can be told to fail
    #[derive(Debug, Default)]
    pub(crate) struct Sink {
        pub data: Vec<u8>,
        pub broken: bool,
        pub shut: bool,
    }

    impl Sink {
        pub fn broken() -> Self {
            Self {
                broken: true,
                ..Self::default()
            }
        }
    }

    impl AsyncWrite for Sink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.broken {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }
            self.data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.shut = true;
            Poll::Ready(Ok(()))
        }
    }

    pub(crate) fn add(state: &mut RelayState<Sink>, sink: Sink) -> (ConnectionId, AbortHandle) {
        let (abort, _registration) = AbortHandle::new_pair();
        let peer = "127.0.0.1:6000".parse().unwrap();
        let id = state
            .registry
            .add(peer, sink, abort.clone())
            .expect("registry has room");
        (id, abort)
    }

    #[tokio::test]
    async fn test_kick_known_nickname() {
        let mut state = RelayState::new(4);
        let (a, reader) = add(&mut state, Sink::default());
        let (b, _) = add(&mut state, Sink::default());
        state.nicknames.learn("A", a);

        let outcome = state.kick("A", b"bye\n").await;

        assert!(matches!(outcome, KickOutcome::Kicked { id, .. } if id == a));
        assert!(reader.is_aborted());
        assert!(!state.registry.contains(a));
        assert!(state.registry.contains(b));
        assert_eq!(state.registry.len(), 1);
        assert_eq!(state.nicknames.lookup("A"), None);
    }

    #[tokio::test]
    async fn test_kick_unknown_is_noop() {
        let mut state = RelayState::new(4);
        let (a, _) = add(&mut state, Sink::default());
        state.nicknames.learn("A", a);

        assert_eq!(state.kick("ghost", b"bye\n").await, KickOutcome::NotFound);
        assert_eq!(state.registry.len(), 1);
        assert_eq!(state.nicknames.len(), 1);
    }

    #[tokio::test]
    async fn test_kick_twice_reports_not_found() {
        let mut state = RelayState::new(4);
        let (a, _) = add(&mut state, Sink::default());
        state.nicknames.learn("A", a);

        assert!(matches!(state.kick("A", b"bye\n").await, KickOutcome::Kicked { .. }));
        assert_eq!(state.kick("A", b"bye\n").await, KickOutcome::NotFound);
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_kick_stale_entry_is_erased() {
        let mut state = RelayState::new(4);
        let (a, _) = add(&mut state, Sink::default());
        state.registry.remove(a);
        state.nicknames.learn("A", a);

        assert_eq!(state.kick("A", b"bye\n").await, KickOutcome::NotFound);
        assert!(state.nicknames.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_frees_slot_and_names() {
        let mut state = RelayState::new(2);
        let (a, reader) = add(&mut state, Sink::default());
        state.nicknames.learn("A", a);

        assert!(state.disconnect(a).await);
        assert!(reader.is_aborted());
        assert!(state.registry.is_empty());
        assert!(state.nicknames.is_empty());

        // Already gone
        assert!(!state.disconnect(a).await);
    }

    #[test]
    fn test_list_reports_nicknames() {
        let mut state = RelayState::new(2);
        let (a, _) = add(&mut state, Sink::default());
        let (_b, _) = add(&mut state, Sink::default());
        if let Some(conn) = state.registry.get_mut(a) {
            conn.nickname = Some("A".into());
        }

        let rows = state.list();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nickname.as_deref(), Some("A"));
        assert_eq!(rows[1].nickname, None);
    }
}
