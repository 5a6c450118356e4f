//! Network infrastructure for the subscriber.
//!
//! [`Subscriber`] owns one TCP connection to a relay server:
//!
//! - [`Subscriber::connect`] opens the connection and consumes the handshake
//!   line, failing if the first line is anything else.
//! - [`Subscriber::next_event`] yields decoded events until the server closes
//!   the connection.
//!
//! The write side of the socket is kept open but never used.  Closing it
//! would look like a hang-up to the server, which removes the subscriber.

use std::net::SocketAddr;
use std::time::Duration;

use relay_core::{decode_line, ControlMessage, ForwardedEvent, ProtocolError, ServerMessage};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info};

use crate::domain::config::SubscriberConfig;

/// Errors that can occur in the subscriber network layer.
#[derive(Debug, Error)]
pub enum SubscriberError {
    /// TCP connection to the server failed.
    #[error("failed to connect to relay server at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A line could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The server closed the connection before the handshake.
    #[error("connection closed by relay server")]
    Closed,
    /// The first line was not the `connected` handshake.
    #[error("expected handshake, got {0}")]
    MissingHandshake(String),
    /// No line arrived within the configured read timeout.
    #[error("no data from relay server within {0:?}")]
    Timeout(Duration),
}

/// A connected, handshaken subscription to a relay server.
pub struct Subscriber {
    stream: BufReader<TcpStream>,
    server_addr: SocketAddr,
    platform_version: String,
    read_timeout: Option<Duration>,
}

impl Subscriber {
    /// Connects to the server and validates its handshake.
    ///
    /// # Errors
    ///
    /// - [`SubscriberError::ConnectFailed`] if the TCP connect fails.
    /// - [`SubscriberError::Closed`] if the server hangs up first.
    /// - [`SubscriberError::MissingHandshake`] if the first line is not the
    ///   handshake.
    /// - [`SubscriberError::Timeout`] if the handshake does not arrive within
    ///   `read_timeout`.
    pub async fn connect(config: &SubscriberConfig) -> Result<Self, SubscriberError> {
        let addr = config.server_addr;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| SubscriberError::ConnectFailed { addr, source })?;
        debug!(%addr, "connected; waiting for handshake");

        let mut subscriber = Self {
            stream: BufReader::new(stream),
            server_addr: addr,
            platform_version: String::new(),
            read_timeout: config.read_timeout,
        };

        let line = subscriber.read_line().await?.ok_or(SubscriberError::Closed)?;
        match decode_line(&line)? {
            ServerMessage::Control(control) if control.is_handshake() => {
                let ControlMessage::Status {
                    platform_version, ..
                } = control;
                info!(%addr, %platform_version, "subscribed to relay server");
                subscriber.platform_version = platform_version;
                Ok(subscriber)
            }
            _ => Err(SubscriberError::MissingHandshake(
                line.trim_end().to_string(),
            )),
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` when the server closes the connection.  Status
    /// lines after the handshake are logged and skipped.
    ///
    /// # Errors
    ///
    /// I/O failures, undecodable lines, and read timeouts.
    pub async fn next_event(&mut self) -> Result<Option<ForwardedEvent>, SubscriberError> {
        loop {
            let Some(line) = self.read_line().await? else {
                info!(addr = %self.server_addr, "relay server closed the connection");
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(&line)? {
                ServerMessage::Event(msg) => return Ok(Some(ForwardedEvent::try_from(msg)?)),
                ServerMessage::Control(ControlMessage::Status { message, .. }) => {
                    debug!(%message, "status from relay server");
                }
            }
        }
    }

    /// `platform_version` announced in the handshake.
    pub fn platform_version(&self) -> &str {
        &self.platform_version
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Reads one raw line; `None` at EOF.
    async fn read_line(&mut self) -> Result<Option<String>, SubscriberError> {
        let mut line = String::new();
        let read = match self.read_timeout {
            Some(limit) => time::timeout(limit, self.stream.read_line(&mut line))
                .await
                .map_err(|_| SubscriberError::Timeout(limit))?,
            None => self.stream.read_line(&mut line).await,
        };
        match read? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
