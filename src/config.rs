//! Relay configuration
//!
//! Server and client settings with the reference defaults. Every field can
//! be overridden from a JSON file; missing fields keep their default.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default listening address (all interfaces, port 8080)
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default address the client connects to
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";

/// Maximum simultaneous connections
pub const DEFAULT_CAPACITY: usize = 10;

/// Bytes read or sent per cycle
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Sent to a connection right before the operator kicks it
pub const DEFAULT_KICK_NOTICE: &str = "You have been kicked from the server.\n";

/// Server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub capacity: usize,
    pub buffer_size: usize,
    pub kick_notice: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            capacity: DEFAULT_CAPACITY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            kick_notice: DEFAULT_KICK_NOTICE.to_string(),
        }
    }
}

/// Client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: String,
    pub nickname: String,
    pub connect_attempts: u32,
    pub retry_delay_ms: u64,
    pub drain_grace_ms: u64,
    pub buffer_size: usize,
}

impl ClientConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            nickname: "Anonymous".to_string(),
            connect_attempts: 3,
            retry_delay_ms: 5000,
            drain_grace_ms: 500,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl RelayConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON document
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.capacity == 0 {
            return Err(ConfigError::Invalid("server.capacity must be at least 1".into()));
        }
        if self.server.buffer_size == 0 || self.client.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be at least 1".into()));
        }
        if self.client.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "client.connect_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
