//! Domain layer for relay-server.
//!
//! Pure types with no dependencies on I/O, networking, or the async runtime.
//!
//! - Configuration structures
//! - The lifecycle state machine states
//! - Human-readable status notices

pub mod config;
pub mod status;

pub use config::{InvalidConfig, ServerConfig, DEFAULT_PORT};
pub use status::{ServerState, ServerStatus};
