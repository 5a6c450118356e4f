//! Domain entities for the notification relay.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: the forwarded event value type and the rules that decide
//! which raw notifications become events.
//!
//! Code in outer layers (server, client) depends on the domain, but the
//! domain never depends on them.

/// The forwarded event value type.
pub mod event;

/// Producer-side filtering of raw notifications.
pub mod intake;
