//! Notify Channel - Entry Point
//!
//! CLI application for listening to a notification server.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, warn};

use notify_channel::protocol::{
    decode_payload, HistoryRecord, OcrCompleted, ProcessCompleted, ProcessFailed, ProcessStarted,
};
use notify_channel::util::init_tracing;
use notify_channel::{
    listener, Config, ConnectionManager, ConnectionState, Event, RetryPolicy, VERSION,
};

/// How long a single connection probe may take
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the close handshake on exit
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Notify Channel - real-time notification client
#[derive(Parser)]
#[command(name = "notify-channel")]
#[command(version = VERSION)]
#[command(about = "Listen to a real-time notification server over WebSocket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and log notifications until interrupted
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "notify-config.toml")]
        config: PathBuf,
    },
    /// Check that the server accepts a connection
    TestConnection {
        /// Path to configuration file
        #[arg(short, long, default_value = "notify-config.toml")]
        config: PathBuf,
    },
    /// Connect, send one message and disconnect
    Send {
        /// Path to configuration file
        #[arg(short, long, default_value = "notify-config.toml")]
        config: PathBuf,
        /// Message text, sent verbatim
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install the ring crypto provider for rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_channel(config).await,
        Commands::TestConnection { config } => test_connection(config).await,
        Commands::Send { config, message } => send_message(config, message).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config> {
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    init_tracing(&config.logging)?;
    Ok(config)
}

async fn run_channel(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;

    info!(
        version = VERSION,
        config_path = ?config_path,
        "Starting Notify Channel"
    );

    let mut channel = ConnectionManager::from_config(&config)?;
    register_log_listeners(&mut channel);

    info!(
        url = %channel.url(),
        max_attempts = config.reconnect.max_attempts,
        interval_ms = config.reconnect.interval_ms,
        "Channel started"
    );

    channel.connect();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = channel.turn() => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    close_gracefully(&mut channel).await;

    info!(stats = %channel.stats().to_json(), "Channel stopped");
    Ok(())
}

async fn test_connection(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;

    info!(url = %config.server.endpoint(), "Testing connection to server");

    let mut channel = ConnectionManager::from_config(&config)?;
    channel.set_policy(RetryPolicy::new(0, Duration::from_millis(config.reconnect.interval_ms)));
    channel.on(
        Event::Error,
        listener(|payload| {
            warn!(error = %payload, "Connection error");
            Ok(())
        }),
    );

    let state = probe(&mut channel).await;
    close_gracefully(&mut channel).await;

    match state {
        ConnectionState::Connected => {
            info!("Connection test successful!");
            Ok(())
        }
        other => {
            error!(state = %other, "Connection test failed");
            bail!("could not connect to {}", channel.url())
        }
    }
}

async fn send_message(config_path: PathBuf, message: String) -> Result<()> {
    let config = load_config(&config_path)?;

    let mut channel = ConnectionManager::from_config(&config)?;
    channel.set_policy(RetryPolicy::new(0, Duration::from_millis(config.reconnect.interval_ms)));

    if probe(&mut channel).await != ConnectionState::Connected {
        close_gracefully(&mut channel).await;
        bail!("could not connect to {}", channel.url());
    }

    let sent = channel.send(message);
    close_gracefully(&mut channel).await;

    if !sent {
        bail!("message was not sent");
    }
    info!("Message sent");
    Ok(())
}

/// Connect and wait until the link is open or has given up
async fn probe(channel: &mut ConnectionManager) -> ConnectionState {
    channel.connect();

    let settle = async {
        while !matches!(
            channel.state(),
            ConnectionState::Connected | ConnectionState::Failed
        ) {
            channel.turn().await;
        }
    };

    if tokio::time::timeout(PROBE_TIMEOUT, settle).await.is_err() {
        warn!(timeout_secs = PROBE_TIMEOUT.as_secs(), "Connection attempt timed out");
    }
    channel.state()
}

/// Close the link and give the close handshake a moment to finish
async fn close_gracefully(channel: &mut ConnectionManager) {
    channel.shutdown();

    let drain = async {
        while channel.has_link() {
            channel.turn().await;
        }
    };

    if tokio::time::timeout(CLOSE_GRACE, drain).await.is_err() {
        debug!("Close handshake did not finish in time");
    }
}

fn register_log_listeners(channel: &mut ConnectionManager) {
    channel
        .on(
            Event::Connect,
            listener(|_| {
                info!("Connected, receiving live notifications");
                Ok(())
            }),
        )
        .on(
            Event::Disconnect,
            listener(|_| {
                warn!("Disconnected from notification server");
                Ok(())
            }),
        )
        .on(
            Event::Error,
            listener(|payload| {
                warn!(error = %payload, "Connection error");
                Ok(())
            }),
        )
        .on(
            Event::Message,
            listener(|payload| {
                debug!(message = %payload, "Message received");
                Ok(())
            }),
        )
        .on(
            Event::History,
            listener(|payload| {
                let records: Vec<HistoryRecord> = decode_payload(payload)?;
                info!(records = records.len(), "History received");
                for record in &records {
                    debug!(id = record.id, title = %record.title, timestamp = %record.timestamp, "History record");
                }
                Ok(())
            }),
        )
        .on(
            Event::ProcessStart,
            listener(|payload| {
                let started: ProcessStarted = decode_payload(payload)?;
                info!(id = %started.id, status = %started.status, "Processing started");
                Ok(())
            }),
        )
        .on(
            Event::OcrComplete,
            listener(|payload| {
                let ocr: OcrCompleted = decode_payload(payload)?;
                info!(id = %ocr.id, text_len = ocr.text.len(), status = %ocr.status, "Text recognized");
                Ok(())
            }),
        )
        .on(
            Event::ProcessComplete,
            listener(|payload| {
                let done: ProcessCompleted = decode_payload(payload)?;
                info!(
                    id = done.id,
                    process_id = %done.process_id,
                    answer_len = done.answer.len(),
                    "Processing complete"
                );
                Ok(())
            }),
        )
        .on(
            Event::ProcessError,
            listener(|payload| {
                let failed: ProcessFailed = decode_payload(payload)?;
                error!(id = %failed.id, error = %failed.error, "Processing failed");
                Ok(())
            }),
        );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
