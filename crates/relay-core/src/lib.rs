//! # relay-core
//!
//! Shared library for the notification relay containing the event model, the
//! line-delimited JSON wire protocol, and the producer-side intake filter.
//!
//! This crate is used by both the server and the client applications.
//! It has zero dependencies on sockets, async runtimes, or OS APIs.
//!
//! # Architecture overview (for beginners)
//!
//! The relay forwards events produced on one device (phone notifications,
//! shared clipboard text) to any number of subscribers on the same LAN.  The
//! subscribers open a plain TCP connection and read one JSON object per line.
//!
//! This crate (`relay-core`) is the shared foundation.  It defines:
//!
//! - **`domain`**: The [`ForwardedEvent`] value type and the intake filter
//!   that decides which raw notifications are worth forwarding at all.
//!
//! - **`protocol`**: How events travel over the network.  Every message is a
//!   single JSON object followed by `\n`.  The server sends one handshake
//!   line per connection, then one line per event.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::ForwardedEvent` instead of `relay_core::domain::event::ForwardedEvent`.
pub use domain::event::ForwardedEvent;
pub use domain::intake::{IntakeFilter, NotificationCandidate, RejectReason};
pub use protocol::codec::{decode_line, encode_line, ProtocolError};
pub use protocol::messages::{ControlMessage, EventMessage, ServerMessage};
