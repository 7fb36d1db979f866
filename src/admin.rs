//! Operator console
//!
//! Reads line commands from the server's control input for as long as the
//! server runs and applies them to the shared state. Each command takes the
//! state lock once, so the multiplexer never sees a half-applied change.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::AdminError;
use crate::state::{ConnectionInfo, KickOutcome, RelayState};
use crate::types::ConnectionId;

const HELP: &str = "Commands: kick <nickname> | list | help";

/// Operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Disconnect the connection known by this nickname
    Kick(String),
    /// Show active connections
    List,
    /// Show available commands
    Help,
}

impl AdminCommand {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, AdminError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let cmd = match word.to_ascii_lowercase().as_str() {
            "kick" if rest.is_empty() => return Err(AdminError::MissingTarget),
            "kick" => AdminCommand::Kick(rest.to_string()),
            "list" => AdminCommand::List,
            "help" => AdminCommand::Help,
            _ => return Err(AdminError::UnknownCommand(word.to_string())),
        };
        Ok(Some(cmd))
    }
}

/// What the operator is told after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminReport {
    Kicked {
        name: String,
        id: ConnectionId,
        peer: SocketAddr,
    },
    NotFound(String),
    Listing(Vec<ConnectionInfo>),
    Help,
    Rejected(AdminError),
}

impl fmt::Display for AdminReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminReport::Kicked { name, id, peer } => {
                write!(f, "Kicked '{}' (slot {}, {})", name, id.slot, peer)
            }
            AdminReport::NotFound(name) => write!(f, "User '{}' not found", name),
            AdminReport::Listing(rows) if rows.is_empty() => write!(f, "No active connections"),
            AdminReport::Listing(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(
                        f,
                        "slot {:>2}  {:<21}  {}",
                        row.id.slot,
                        row.peer,
                        row.nickname.as_deref().unwrap_or("-")
                    )?;
                }
                Ok(())
            }
            AdminReport::Help => write!(f, "{}", HELP),
            AdminReport::Rejected(err) => write!(f, "{}", err),
        }
    }
}

/// Applies operator commands to the shared relay state
pub struct AdminConsole<H> {
    state: Arc<Mutex<RelayState<H>>>,
    notice: Vec<u8>,
}

impl<H> AdminConsole<H>
where
    H: AsyncWrite + Unpin,
{
    pub fn new(state: Arc<Mutex<RelayState<H>>>, notice: impl Into<Vec<u8>>) -> Self {
        Self {
            state,
            notice: notice.into(),
        }
    }

    /// Apply one command
    pub async fn execute(&self, cmd: AdminCommand) -> AdminReport {
        match cmd {
            AdminCommand::Kick(name) => {
                let mut state = self.state.lock().await;
                match state.kick(&name, &self.notice).await {
                    KickOutcome::Kicked { id, peer } => AdminReport::Kicked { name, id, peer },
                    KickOutcome::NotFound => AdminReport::NotFound(name),
                }
            }
            AdminCommand::List => AdminReport::Listing(self.state.lock().await.list()),
            AdminCommand::Help => AdminReport::Help,
        }
    }

    /// Parse and apply one input line
    pub async fn handle_line(&self, line: &str) -> Option<AdminReport> {
        match AdminCommand::parse(line) {
            Ok(Some(cmd)) => Some(self.execute(cmd).await),
            Ok(None) => None,
            Err(e) => Some(AdminReport::Rejected(e)),
        }
    }

    /// Serve commands from `input` until it ends, writing reports to `output`
    pub async fn run<R, W>(self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Admin console ready");
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await? {
            let Some(report) = self.handle_line(&line).await else {
                continue;
            };
            debug!("Admin command '{}': {:?}", line.trim(), report);
            output.write_all(format!("{}\n", report).as_bytes()).await?;
            output.flush().await?;
        }

        info!("Admin input closed");
        Ok(())
    }
}
