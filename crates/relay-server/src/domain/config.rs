//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings of
//! the forwarding server.  It can be constructed from a TOML file plus CLI
//! arguments (see `infrastructure::storage::config` and `main.rs`) or from
//! defaults (useful for tests).
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads inside the domain) makes the server easy to embed in tests: bind to
//! `127.0.0.1:0` and let the OS pick a free port.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

/// Port subscribers connect to unless configured otherwise.
pub const DEFAULT_PORT: u16 = 12345;

/// A configuration value that cannot be used to run the server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid configuration: {0}")]
pub struct InvalidConfig(pub String);

/// All runtime configuration for the forwarding server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address and port the listener binds to.
    ///
    /// `0.0.0.0` accepts subscribers on every interface, which is what a LAN
    /// relay normally wants.
    pub bind_addr: SocketAddr,

    /// Sent to every subscriber in the handshake's `platform_version` field.
    pub platform_version: String,

    /// Upper bound on a single write to one subscriber.
    ///
    /// A subscriber that stops reading fills its socket buffer and would
    /// otherwise stall the delivery loop for everyone.  Exceeding this bound
    /// counts as a write failure and evicts the subscriber.
    pub write_timeout: Duration,

    /// Backoff after a transient `accept()` error before trying again.
    pub accept_retry_delay: Duration,
}

impl Default for ServerConfig {
    /// | Field              | Default          |
    /// |--------------------|------------------|
    /// | bind_addr          | `0.0.0.0:12345`  |
    /// | platform_version   | host OS name     |
    /// | write_timeout      | 5 seconds        |
    /// | accept_retry_delay | 1 second         |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            platform_version: std::env::consts::OS.to_string(),
            write_timeout: Duration::from_secs(5),
            accept_retry_delay: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    /// Checks values that would make the server misbehave at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] for a zero write timeout (every write would
    /// fail) or a zero accept retry delay (a persistent accept error would spin).
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.write_timeout.is_zero() {
            return Err(InvalidConfig("write timeout must be greater than zero".into()));
        }
        if self.accept_retry_delay.is_zero() {
            return Err(InvalidConfig(
                "accept retry delay must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Config bound to an OS-assigned loopback port.
    pub fn loopback_ephemeral() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            ..Self::default()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
