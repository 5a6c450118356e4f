//! Infrastructure layer for relay-server.
//!
//! Contains OS-facing adapters: the TCP acceptor, LAN address discovery,
//! the TOML configuration file, status sinks, and the lifecycle controller
//! that composes them.
//!
//! **Dependency rule**: this layer may depend on `application` and `domain`,
//! but MUST NOT be imported by them.

pub mod network;
pub mod server;
pub mod status_sink;
pub mod storage;
