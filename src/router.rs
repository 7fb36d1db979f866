//! Broadcast router
//!
//! Copies one inbound chunk to every other active connection and learns
//! nicknames from what it forwards. A nickname is only learned from a chunk
//! that reached at least one peer, so a sender alone on the relay, or one
//! whose every recipient failed, claims no name.
//!
//! Chunks are forwarded exactly as one read returned them. The wire carries
//! no framing, so a receiver may see two messages merged into one chunk or
//! one message split across two.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::nickname::{NicknameExtractor, SeparatorExtractor};
use crate::state::RelayState;
use crate::types::ConnectionId;

/// Outcome of one forward
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardReport {
    /// Peers that received the full chunk
    pub delivered: usize,
    /// Peers whose write failed; to be disconnected by the caller
    pub failed: Vec<ConnectionId>,
    /// Nickname learned from the chunk, if any
    pub learned: Option<String>,
}

/// Forwards chunks between connections
pub struct BroadcastRouter {
    extractor: Box<dyn NicknameExtractor>,
}

impl BroadcastRouter {
    pub fn new(extractor: Box<dyn NicknameExtractor>) -> Self {
        Self { extractor }
    }

    /// Write `bytes` to every active connection except `origin`
    ///
    /// A failed write does not stop the broadcast. Failing peers are listed
    /// in the report and are not retried. The origin's nickname is learned
    /// only if some peer received the chunk.
    pub async fn forward<H>(
        &self,
        state: &mut RelayState<H>,
        origin: ConnectionId,
        bytes: &[u8],
    ) -> ForwardReport
    where
        H: AsyncWrite + Unpin,
    {
        let mut report = ForwardReport::default();

        for conn in state.registry.iter_mut().filter(|c| c.id != origin) {
            match conn.handle.write_all(bytes).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Write to {} ({}) failed: {}", conn.id, conn.peer, e);
                    report.failed.push(conn.id);
                }
            }
        }

        if report.delivered > 0 {
            report.learned = self.learn(state, origin, bytes);
        }
        report
    }

    fn learn<H>(
        &self,
        state: &mut RelayState<H>,
        origin: ConnectionId,
        bytes: &[u8],
    ) -> Option<String> {
        let name = self.extractor.extract(bytes)?;
        let conn = state.registry.get_mut(origin)?;

        if conn.nickname.as_deref() != Some(name) {
            debug!("Connection {} is now known as '{}'", origin, name);
        }
        conn.nickname = Some(name.to_string());
        state.nicknames.learn(name, origin);
        Some(name.to_string())
    }
}

impl Default for BroadcastRouter {
    fn default() -> Self {
        Self::new(Box::new(SeparatorExtractor))
    }
}
