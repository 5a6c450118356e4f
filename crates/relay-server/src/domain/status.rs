//! Lifecycle states and status notices.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! Stopped ──start()──► Starting ──bind ok──► Listening ──stop()──► Stopping ──► Stopped
//!                          │
//!                          └──bind failed──► Stopped
//! ```
//!
//! Only the lifecycle controller moves between states.  A bound listener and a
//! running delivery loop exist if and only if the state is `Listening`.

use std::fmt;
use std::net::SocketAddr;

/// Lifecycle state of the forwarding server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Listening,
    Stopping,
}

impl ServerState {
    /// `true` while starting up or listening.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Listening)
    }
}

/// A human-readable status notice for the persistent status surface.
///
/// The `Display` form is the exact text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    /// The listener is bound; the address is the one subscribers should use.
    Listening(SocketAddr),
    /// Number of currently registered subscribers.
    Clients(usize),
    /// Something failed; the detail is already human-readable.
    Error(String),
    /// The server has fully stopped.
    Stopped,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listening(addr) => write!(f, "Listening on {}:{}", addr.ip(), addr.port()),
            Self::Clients(n) => write!(f, "Clients: {n}"),
            Self::Error(detail) => write!(f, "Error: {detail}"),
            Self::Stopped => f.write_str("Stopped"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
