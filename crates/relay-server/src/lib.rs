//! relay-server library crate.
//!
//! The event forwarding server: it accepts events from a producer that must
//! never be blocked, and fans each one out to every subscriber currently
//! connected over TCP.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! producer ──ingest()──► [ingestion queue] ──► delivery loop ──► registry ──► sockets
//!                                                                   ▲
//!                                         acceptor ──register───────┘
//!
//! [relay-server]
//!   ├── domain/           Pure types: ServerConfig, ServerState, ServerStatus
//!   ├── application/      Queue, connection registry, delivery loop, StatusSink port
//!   └── infrastructure/
//!         ├── network/    TCP acceptor, LAN address discovery
//!         ├── storage/    TOML configuration file
//!         ├── status_sink Logging and channel status sinks
//!         └── server      ForwardingServer: the lifecycle controller
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `relay-core`; it only sees
//!   connections through `tokio::io::AsyncWrite`, never through sockets.
//! - `infrastructure` owns sockets and composes everything into
//!   [`ForwardingServer`].

/// Domain layer: configuration and state types (no I/O).
pub mod domain;

/// Application layer: ingestion, registry, and delivery logic.
pub mod application;

/// Infrastructure layer: sockets, config files, status sinks, lifecycle.
pub mod infrastructure;

pub use application::{ConnectionRegistry, IngestError, StatusSink};
pub use domain::{ServerConfig, ServerState, ServerStatus};
pub use infrastructure::server::{ForwardingServer, ServerError};
