//! Error types for the chat relay
//!
//! Defines server, client, operator and local-input errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Server-side errors
///
/// All of these are fatal: per-connection failures never surface here,
/// they tear down the one connection and the loop continues.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting from the listening socket failed
    #[error("Accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client session errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Every connection attempt failed
    #[error("Could not connect to {addr} after {attempts} attempts")]
    ConnectExhausted { addr: String, attempts: u32 },
}

/// Rejected local input
///
/// Reported to the user; never affects the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Nothing to send
    #[error("Message is empty")]
    EmptyMessage,

    /// Constructed message does not fit in one buffer
    #[error("Message is too long ({len} bytes, limit {max})")]
    MessageTooLong { len: usize, max: usize },

    /// `/nick` without a name
    #[error("Nickname is empty")]
    EmptyNickname,

    /// Nickname over the length limit
    #[error("Nickname is too long ({len} bytes, limit {max})")]
    NicknameTooLong { len: usize, max: usize },

    /// Nickname containing the message separator
    #[error("Nickname must not contain \": \"")]
    NicknameSeparator,
}

/// Malformed operator commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// `kick` without a nickname
    #[error("Usage: kick <nickname>")]
    MissingTarget,

    /// Not a known command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for the expected shape
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// Values that parse but cannot be used
    #[error("Invalid config: {0}")]
    Invalid(String),
}
