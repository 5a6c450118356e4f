//! relay-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does relay-client do? (for beginners)
//!
//! The *subscriber* is any machine on the LAN that wants to see the events a
//! relay server forwards.  It:
//!
//! 1. Opens a TCP connection to the server (port 12345 by default).
//! 2. Reads the first line and checks that it is the
//!    `{"type":"status","message":"connected",...}` handshake.
//! 3. Reads one JSON event per line from then on, until the server closes
//!    the connection.
//!
//! It never sends anything; the protocol is one-way.

/// Domain layer: subscriber configuration.
pub mod domain;

/// Infrastructure layer: the TCP subscriber.
pub mod infrastructure;

pub use domain::SubscriberConfig;
pub use infrastructure::network::{Subscriber, SubscriberError};
