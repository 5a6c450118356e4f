//! TOML configuration file for the `relay-server` binary.
//!
//! The file is optional; when `--config <path>` is given it is read once at
//! startup and layered between the built-in defaults and the CLI flags.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 12345
//! platform_version = "linux"
//! write_timeout_ms = 5000
//! accept_retry_delay_ms = 1000
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a `serde` default, so a file containing only the values
//! that differ from the defaults (or even an empty file) is valid.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{InvalidConfig, ServerConfig, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but holds values the server cannot run with.
    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayFileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[server]`: listener and delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Handshake `platform_version`; the host OS name when absent.
    #[serde(default)]
    pub platform_version: Option<String>,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_accept_retry_delay_ms")]
    pub accept_retry_delay_ms: u64,
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSection {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_write_timeout_ms() -> u64 {
    5_000
}
fn default_accept_retry_delay_ms() -> u64 {
    1_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            platform_version: None,
            write_timeout_ms: default_write_timeout_ms(),
            accept_retry_delay_ms: default_accept_retry_delay_ms(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RelayFileConfig {
    /// Converts the file's `[server]` section into a validated [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP address
    /// or a timeout is zero.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let ip: IpAddr = self.server.bind_address.parse().map_err(|_| {
            InvalidConfig(format!(
                "bind_address {:?} is not an IP address",
                self.server.bind_address
            ))
        })?;

        let mut config = ServerConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            write_timeout: Duration::from_millis(self.server.write_timeout_ms),
            accept_retry_delay: Duration::from_millis(self.server.accept_retry_delay_ms),
            ..ServerConfig::default()
        };
        if let Some(version) = &self.server.platform_version {
            config.platform_version = version.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has the
/// wrong type.
pub fn parse_config(content: &str) -> Result<RelayFileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Reads and parses the configuration file at `path`.
///
/// The path was named explicitly by the user, so a missing file is an error
/// rather than a silent fallback to defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<RelayFileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
