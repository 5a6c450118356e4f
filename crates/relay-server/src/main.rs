//! Notification relay server: entry point.
//!
//! Starts a [`ForwardingServer`] that accepts subscriber connections on TCP
//! and fans every ingested event out to all of them as one JSON line.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>              TOML configuration file
//!   --bind <IP>                  Listener IP address [default: 0.0.0.0]
//!   --port <PORT>                Listener port [default: 12345]
//!   --platform-version <STRING>  Handshake platform_version [default: host OS]
//!   --log-level <LEVEL>          Log level when RUST_LOG is unset [default: info]
//!   --stdin                      Forward each stdin line as a shared-text event
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the `--config` file, then CLI flags and their
//! environment variables:
//!
//! | Variable     | Flag     |
//! |--------------|----------|
//! | `RELAY_BIND` | `--bind` |
//! | `RELAY_PORT` | `--port` |
//!
//! # Shutdown
//!
//! Ctrl+C stops the server cleanly.  With `--stdin`, reaching end of input
//! stops it too, so `echo hello | relay-server --stdin` forwards one event to
//! whoever is connected and exits.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_core::ForwardedEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_server::infrastructure::status_sink::LogStatusSink;
use relay_server::infrastructure::storage::{load_config, RelayFileConfig};
use relay_server::{ForwardingServer, ServerConfig};

/// How long end of input waits for queued lines to reach subscribers.
const STDIN_FLUSH_LIMIT: Duration = Duration::from_secs(5);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Notification relay server.
///
/// Forwards events to every subscriber connected over TCP, one JSON object
/// per line.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "Forwards notification events to LAN subscribers over line-delimited JSON",
    version
)]
struct Cli {
    /// TOML configuration file.  Flags given on the command line win over it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP address to bind.  `0.0.0.0` accepts subscribers on every interface.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// TCP port subscribers connect to.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Value sent in the handshake's `platform_version` field.
    #[arg(long)]
    platform_version: Option<String>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long)]
    log_level: Option<String>,

    /// Forward each line read from stdin as a shared-text event.
    #[arg(long)]
    stdin: bool,
}

/// Everything `main` needs after merging the config file and the flags.
#[derive(Debug)]
struct Settings {
    server: ServerConfig,
    log_level: String,
    forward_stdin: bool,
}

impl Cli {
    /// Layers the CLI flags over the config file (or the defaults).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, `--bind` is not
    /// an IP address, or the merged configuration is invalid.
    fn into_settings(self) -> anyhow::Result<Settings> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => RelayFileConfig::default(),
        };
        let mut server = file.to_server_config()?;

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            server.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            server.bind_addr.set_port(port);
        }
        if let Some(version) = self.platform_version {
            server.platform_version = version;
        }
        server.validate()?;

        Ok(Settings {
            server,
            log_level: self.log_level.unwrap_or(file.logging.level),
            forward_stdin: self.stdin,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Cli::parse().into_settings()?;

    // RUST_LOG wins; otherwise the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    info!(
        bind = %settings.server.bind_addr,
        platform_version = %settings.server.platform_version,
        "notification relay server starting"
    );

    let server = ForwardingServer::new(settings.server, Arc::new(LogStatusSink));
    server
        .start()
        .await
        .context("failed to start forwarding server")?;

    let outcome = if settings.forward_stdin {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl+C")
                    .map(|()| info!("received Ctrl+C; shutting down"))
            }
            forwarded = forward_lines(&server, BufReader::new(tokio::io::stdin())) => {
                forwarded.map(|count| info!(count, "stdin closed; shutting down"))
            }
        }
    } else {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl+C")
            .map(|()| info!("received Ctrl+C; shutting down"))
    };

    // Stop even when waiting failed, so subscribers see a clean close.
    server.stop().await;
    outcome?;

    info!("notification relay server stopped");
    Ok(())
}

/// Ingests each non-empty line of `input` as a shared-text event until EOF,
/// then waits for them to be broadcast.
///
/// Returns the number of lines forwarded.
async fn forward_lines<R>(server: &ForwardingServer, input: R) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let text = line.trim_end();
        if text.is_empty() {
            continue;
        }
        match server.ingest(ForwardedEvent::clipboard(text)) {
            Ok(()) => forwarded += 1,
            Err(e) => warn!(reason = e.reason(), "shared text not forwarded"),
        }
    }

    // stop() discards the backlog, so let the last lines go out first.
    if !server.flush(STDIN_FLUSH_LIMIT).await {
        warn!("stopping with stdin lines still undelivered");
    }
    Ok(forwarded)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
