//! Multi-client TCP Chat Relay Library
//!
//! A chat relay server that rebroadcasts every chunk it receives to all
//! other connected peers, plus a client that keeps its session alive across
//! transient disconnects.
//!
//! # Features
//! - Fixed-capacity connection registry with slot reuse
//! - Single-task multiplexer over the listener and every connection
//! - Broadcast to all peers except the sender
//! - Nickname learning from `"<name>: <text>"` traffic
//! - Operator console (`kick <nickname>`, `list`)
//! - Client reconnection with bounded retries
//! - TCP keepalive on every socket, so silent peers are eventually dropped
//!
//! # Architecture
//! The server keeps the registry and nickname table in one
//! `Arc<Mutex<RelayState>>` shared by two tasks:
//! - the multiplexer (`RelayServer::run`), which accepts, reads and forwards
//! - the admin console (`AdminConsole::run`), which kicks connections
//!
//! Every structural change to the shared state happens under that lock.
//!
//! The wire carries plain bytes with no framing. Chunks are forwarded as one
//! read returned them, so receivers may see merged or split messages.
//!
//! # Example
//! ```ignore
//! use chat_relay::{AdminConsole, RelayServer, ServerConfig};
//! use tokio::io::{stdin, stdout, BufReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = RelayServer::bind(config.clone()).await?;
//!
//!     let console = AdminConsole::new(server.state(), config.kick_notice);
//!     tokio::spawn(console.run(BufReader::new(stdin()), stdout()));
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod nickname;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use admin::{AdminCommand, AdminConsole, AdminReport};
pub use command::Input;
pub use config::{ClientConfig, RelayConfig, ServerConfig};
pub use connection::Connection;
pub use error::{AdminError, ClientError, ConfigError, InputError, ServerError};
pub use nickname::{NicknameExtractor, NicknameTable, SeparatorExtractor};
pub use registry::{ConnectionRegistry, RegistryFull};
pub use router::{BroadcastRouter, ForwardReport};
pub use server::RelayServer;
pub use session::{ClientSession, SessionEvent, SessionState};
pub use state::{KickOutcome, RelayState, SharedState};
pub use transport::{Connector, TcpConnector};
pub use types::{ConnectionId, Slot};
