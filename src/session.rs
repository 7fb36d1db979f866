//! Client session
//!
//! A session is a four-state machine driven from the send path:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Draining -> Connecting ...
//!                     |                          |
//!                     +-> Disconnected (fatal)   +-> done (user quit)
//! ```
//!
//! While connected, a spawned receive task reads from the socket and reports
//! inbound bytes. When it sees the server go away it fires a one-shot
//! notification and exits; it never reconnects and never closes the socket.
//! Tearing down and reconnecting is always done by the send path.
//!
//! A line whose send fails is kept and re-sent once after the next
//! reconnect. Only the bytes the failed connection did not accept are
//! re-sent, so a peer can see one message split across two chunks but never
//! a repeated prefix.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, Lines, ReadHalf,
    WriteHalf,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{self, Input, HELP, USERS_QUERY};
use crate::config::ClientConfig;
use crate::error::{ClientError, InputError};
use crate::transport::{Connector, TcpConnector};

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Draining,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Draining => "draining",
        };
        f.write_str(name)
    }
}

/// Everything the session wants shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// State transition
    State(SessionState),
    /// Bytes from the server, exactly as one read returned them
    Inbound(Vec<u8>),
    /// Local message for the user
    Notice(String),
    /// Local request to clear the screen
    Clear,
}

/// Why the session left `Connected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainReason {
    Quit,
    SendFailed,
    RemoteClosed,
}

/// Live connection owned by the send path
struct Link<S> {
    writer: WriteHalf<S>,
    receiver: JoinHandle<()>,
    closed: oneshot::Receiver<()>,
}

enum Phase<S> {
    Disconnected,
    Connecting,
    Connected(Link<S>),
    Draining(Link<S>, DrainReason),
}

/// Call `connect` up to `attempts` times, sleeping `delay` between attempts
///
/// Returns the last error once every attempt has failed.
pub async fn retry_connect<T, F, Fut>(
    attempts: u32,
    delay: Duration,
    mut connect: F,
) -> io::Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect(attempt).await {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Reads from the server until it closes, then signals the send path
async fn receive<S: AsyncRead>(
    mut reader: ReadHalf<S>,
    chunk_size: usize,
    events: mpsc::UnboundedSender<SessionEvent>,
    closed: oneshot::Sender<()>,
) {
    let mut buf = vec![0u8; chunk_size];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Server closed the connection");
                break;
            }
            Ok(n) => {
                if events.send(SessionEvent::Inbound(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Read from server failed: {}", e);
                break;
            }
        }
    }
    let _ = closed.send(());
}

/// One client's connection to the relay
pub struct ClientSession<R, C = TcpConnector> {
    config: ClientConfig,
    nickname: String,
    input: Lines<R>,
    events: mpsc::UnboundedSender<SessionEvent>,
    connector: C,
    /// Unsent tail of a line whose send failed, re-sent after the next reconnect
    pending: Option<Vec<u8>>,
}

impl<R> ClientSession<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Create a session reading user lines from `input`
    pub fn new(
        config: ClientConfig,
        input: R,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, InputError> {
        Self::with_connector(config, input, events, TcpConnector)
    }
}

impl<R, C> ClientSession<R, C>
where
    R: AsyncBufRead + Unpin,
    C: Connector,
{
    /// Create a session that opens its connections through `connector`
    pub fn with_connector(
        config: ClientConfig,
        input: R,
        events: mpsc::UnboundedSender<SessionEvent>,
        connector: C,
    ) -> Result<Self, InputError> {
        command::validate_nickname(&config.nickname)?;
        Ok(Self {
            nickname: config.nickname.clone(),
            config,
            input: input.lines(),
            events,
            connector,
            pending: None,
        })
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Drive the session until the user quits or reconnecting fails
    pub async fn run(mut self) -> Result<(), ClientError> {
        let mut phase = Phase::Disconnected;
        loop {
            phase = match phase {
                Phase::Disconnected => {
                    self.enter(SessionState::Connecting);
                    Phase::Connecting
                }
                Phase::Connecting => match self.connect().await {
                    Ok(link) => {
                        self.enter(SessionState::Connected);
                        Phase::Connected(link)
                    }
                    Err(e) => {
                        self.enter(SessionState::Disconnected);
                        return Err(e);
                    }
                },
                Phase::Connected(link) => {
                    let (link, reason) = self.serve(link).await;
                    self.enter(SessionState::Draining);
                    Phase::Draining(link, reason)
                }
                Phase::Draining(link, reason) => {
                    self.drain(link).await;
                    if reason == DrainReason::Quit {
                        self.enter(SessionState::Disconnected);
                        info!("Session ended by user");
                        return Ok(());
                    }
                    self.notice("Connection lost, reconnecting...");
                    self.enter(SessionState::Connecting);
                    Phase::Connecting
                }
            };
        }
    }

    async fn connect(&mut self) -> Result<Link<C::Stream>, ClientError> {
        let addr = self.config.server_addr.clone();
        let attempts = self.config.connect_attempts;
        let events = self.events.clone();
        let connector = &self.connector;

        let stream = retry_connect(attempts, self.config.retry_delay(), |attempt| {
            let _ = events.send(SessionEvent::Notice(format!(
                "Connecting to {} (attempt {}/{})",
                addr, attempt, attempts
            )));
            connector.connect(&addr)
        })
        .await
        .map_err(|e| {
            warn!("Giving up on {}: {}", addr, e);
            ClientError::ConnectExhausted {
                addr: addr.clone(),
                attempts,
            }
        })?;

        info!("Connected to {}", addr);
        self.notice("Connected to server");

        let (reader, writer) = tokio::io::split(stream);
        let (closed_tx, closed_rx) = oneshot::channel();
        let receiver = tokio::spawn(receive(
            reader,
            self.config.buffer_size,
            self.events.clone(),
            closed_tx,
        ));

        Ok(Link {
            writer,
            receiver,
            closed: closed_rx,
        })
    }

    /// Send user input until something ends the connection
    async fn serve(&mut self, mut link: Link<C::Stream>) -> (Link<C::Stream>, DrainReason) {
        if let Some(bytes) = self.pending.take() {
            debug!("Re-sending {} pending bytes", bytes.len());
            if let Err(reason) = self.send(&mut link, bytes).await {
                return (link, reason);
            }
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut link.closed => None,
                line = self.input.next_line() => Some(line),
            };
            let Some(line) = next else {
                return (link, DrainReason::RemoteClosed);
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => return (link, DrainReason::Quit),
                Err(e) => {
                    warn!("Reading input failed: {}", e);
                    return (link, DrainReason::Quit);
                }
            };

            let outgoing = match command::parse_input(&line) {
                Ok(Input::Quit) => return (link, DrainReason::Quit),
                Ok(Input::Nick(name)) => {
                    let notice = command::rename_notice(&self.nickname, &name);
                    self.nickname = name;
                    self.notice(&format!("You are now known as {}", self.nickname));
                    notice
                }
                Ok(Input::Users) => USERS_QUERY.to_string(),
                Ok(Input::Clear) => {
                    let _ = self.events.send(SessionEvent::Clear);
                    continue;
                }
                Ok(Input::Help) => {
                    self.notice(HELP);
                    continue;
                }
                Ok(Input::Text(body)) => {
                    match command::compose_message(&self.nickname, &body, self.config.buffer_size) {
                        Ok(message) => message,
                        Err(e) => {
                            self.notice(&e.to_string());
                            continue;
                        }
                    }
                }
                Err(e) => {
                    self.notice(&e.to_string());
                    continue;
                }
            };

            if let Err(reason) = self.send(&mut link, outgoing.into_bytes()).await {
                return (link, reason);
            }
        }
    }

    /// Write `bytes`, keeping whatever was not accepted as pending on failure
    async fn send(
        &mut self,
        link: &mut Link<C::Stream>,
        bytes: Vec<u8>,
    ) -> Result<(), DrainReason> {
        let mut written = 0;
        let error = loop {
            if written == bytes.len() {
                return Ok(());
            }
            match link.writer.write(&bytes[written..]).await {
                Ok(0) => break io::Error::from(io::ErrorKind::WriteZero),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break e,
            }
        };

        warn!("Send failed after {} of {} bytes: {}", written, bytes.len(), error);
        self.pending = Some(bytes[written..].to_vec());
        Err(DrainReason::SendFailed)
    }

    /// Close the socket and give the receive task a moment to finish
    async fn drain(&mut self, mut link: Link<C::Stream>) {
        if let Err(e) = link.writer.shutdown().await {
            debug!("Shutdown failed: {}", e);
        }
        drop(link.writer);

        let grace = self.config.drain_grace();
        if tokio::time::timeout(grace, &mut link.receiver).await.is_err() {
            debug!("Receive task still running after {:?}, aborting", grace);
            link.receiver.abort();
        }
    }

    fn enter(&self, state: SessionState) {
        debug!("Session {}", state);
        let _ = self.events.send(SessionEvent::State(state));
    }

    fn notice(&self, text: &str) {
        let _ = self.events.send(SessionEvent::Notice(text.to_string()));
    }
}
