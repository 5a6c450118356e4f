//! Notification relay subscriber: entry point.
//!
//! Connects to a relay server, checks the handshake, and prints one line per
//! forwarded event until the server goes away or Ctrl+C is pressed.
//!
//! # Usage
//!
//! ```text
//! relay-client [OPTIONS]
//!
//! Options:
//!   --host <IP>                 Relay server IP address [default: 127.0.0.1]
//!   --port <PORT>               Relay server port [default: 12345]
//!   --read-timeout-secs <SECS>  Give up after this long without data
//!   --log-level <LEVEL>         Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! | Variable     | Flag     |
//! |--------------|----------|
//! | `RELAY_HOST` | `--host` |
//! | `RELAY_PORT` | `--port` |

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_core::ForwardedEvent;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_client::domain::config::DEFAULT_SERVER_PORT;
use relay_client::{Subscriber, SubscriberConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Notification relay subscriber.
#[derive(Debug, Parser)]
#[command(
    name = "relay-client",
    about = "Prints events forwarded by a notification relay server",
    version
)]
struct Cli {
    /// IP address of the relay server.
    #[arg(long, default_value = "127.0.0.1", env = "RELAY_HOST")]
    host: String,

    /// TCP port of the relay server.
    #[arg(long, default_value_t = DEFAULT_SERVER_PORT, env = "RELAY_PORT")]
    port: u16,

    /// Give up when the server sends nothing for this many seconds.
    #[arg(long)]
    read_timeout_secs: Option<u64>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`SubscriberConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--host` is not a valid IP address.
    fn to_subscriber_config(&self) -> anyhow::Result<SubscriberConfig> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid server address: '{}'", self.host))?;

        Ok(SubscriberConfig {
            server_addr: SocketAddr::new(ip, self.port),
            read_timeout: self.read_timeout_secs.map(Duration::from_secs),
        })
    }
}

/// One human-readable line per event.
fn format_event(event: &ForwardedEvent) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        event.source_app_name(),
        event.title(),
        event.body()
    );
    if let Some(icon) = event.icon() {
        line.push_str(&format!(" (icon: {} bytes)", icon.len()));
    }
    line
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.to_subscriber_config()?;
    let mut subscriber = Subscriber::connect(&config).await?;
    info!(
        server = %subscriber.server_addr(),
        platform_version = subscriber.platform_version(),
        "waiting for events"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl+C")?;
                info!("received Ctrl+C; disconnecting");
                break;
            }
            next = subscriber.next_event() => match next? {
                Some(event) => println!("{}", format_event(&event)),
                None => break,
            },
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
