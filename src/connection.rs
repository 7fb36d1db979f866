//! Connection struct definition
//!
//! Represents one active peer link held in the registry.

use std::net::SocketAddr;

use futures_util::future::AbortHandle;

use crate::types::ConnectionId;

/// Active peer connection
///
/// Owns the write handle exclusively until it is removed from the registry.
/// The read side lives in the multiplexer's readiness set and is cancelled
/// through `reader`.
#[derive(Debug)]
pub struct Connection<H> {
    /// Registry handle of this connection
    pub id: ConnectionId,
    /// Remote address
    pub peer: SocketAddr,
    /// Write half of the stream
    pub handle: H,
    /// Learned from traffic, may be absent or stale
    pub nickname: Option<String>,
    /// Cancels the inbound stream in the multiplexer
    reader: AbortHandle,
}

impl<H> Connection<H> {
    /// Create a connection with no nickname yet
    pub fn new(id: ConnectionId, peer: SocketAddr, handle: H, reader: AbortHandle) -> Self {
        Self {
            id,
            peer,
            handle,
            nickname: None,
            reader,
        }
    }

    /// Stop reading and give back the write handle for closing
    pub fn into_handle(self) -> H {
        self.reader.abort();
        self.handle
    }
}
