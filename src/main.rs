//! Chat Relay - Entry Point
//!
//! Runs either the relay server (with the operator console on stdin) or an
//! interactive client.
//!
//! ```text
//! chat_relay server [--config FILE]
//! chat_relay client [ADDR] [NICKNAME] [--config FILE]
//! ```

use std::env;
use std::path::PathBuf;

use tokio::io::{stdin, stdout, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{AdminConsole, ClientSession, RelayConfig, RelayServer, SessionEvent};

const USAGE: &str = "usage: chat_relay server [--config FILE]
       chat_relay client [ADDR] [NICKNAME] [--config FILE]";

/// Clears the terminal and homes the cursor
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_path = take_flag(&mut args, "--config");
    let mut config = match config_path {
        Some(path) => RelayConfig::load(&PathBuf::from(path))?,
        None => RelayConfig::default(),
    };

    let mut args = args.into_iter();
    let result = match args.next().as_deref() {
        Some("server") => run_server(config).await,
        Some("client") => {
            if let Some(addr) = args.next() {
                config.client.server_addr = addr;
            }
            if let Some(nickname) = args.next() {
                config.client.nickname = nickname;
            }
            run_client(config).await
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    // A pending stdin read would keep the runtime from shutting down,
    // so fatal errors leave through process::exit
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_server(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = RelayServer::bind(config.server.clone()).await?;

    // Operator console runs alongside the multiplexer for the server's lifetime
    let console = AdminConsole::new(server.state(), config.server.kick_notice.clone());
    tokio::spawn(async move {
        if let Err(e) = console.run(BufReader::new(stdin()), stdout()).await {
            error!("Admin console error: {}", e);
        }
    });

    server.run().await?;
    Ok(())
}

async fn run_client(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let session = ClientSession::new(config.client, BufReader::new(stdin()), events_tx)?;
    info!("Chatting as {}", session.nickname());

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                SessionEvent::Inbound(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
                SessionEvent::Notice(text) => println!("* {}", text),
                SessionEvent::Clear => print!("{}", CLEAR_SCREEN),
                SessionEvent::State(state) => debug!("Session state: {}", state),
            }
        }
    });

    let result = session.run().await;
    let _ = printer.await;
    result?;
    Ok(())
}

/// Remove `--name VALUE` from `args`, returning VALUE
fn take_flag(args: &mut Vec<String>, name: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == name)?;
    args.remove(pos);
    if pos < args.len() {
        Some(args.remove(pos))
    } else {
        None
    }
}
