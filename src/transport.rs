//! TCP transport setup
//!
//! Every socket the relay opens, listening or outgoing, has `SO_KEEPALIVE`
//! set so a peer that vanished without a FIN is eventually reported as a
//! read error instead of holding a slot forever. Sockets accepted from a
//! keepalive listener inherit the option. Keepalive timing is left to the
//! operating system.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};

/// Pending connections queued by the kernel
const LISTEN_BACKLOG: u32 = 1024;

/// Opens the client's stream to the relay
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn connect(&self, addr: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP with keepalive enabled
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, addr: &str) -> impl Future<Output = io::Result<TcpStream>> + Send {
        let addr = addr.to_string();
        async move { connect(&addr).await }
    }
}

fn keepalive_socket(addr: SocketAddr) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(true)?;
    Ok(socket)
}

/// Bind a keepalive listener on the first address `addr` resolves to
pub async fn bind(addr: &str) -> io::Result<TcpListener> {
    let addr = lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })?;

    let socket = keepalive_socket(addr)?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Connect with keepalive, trying each resolved address in turn
pub async fn connect(addr: &str) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in lookup_host(addr).await? {
        match keepalive_socket(addr)?.connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    }))
}
