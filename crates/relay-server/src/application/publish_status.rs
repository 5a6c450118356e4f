//! The `StatusSink` port.

use crate::domain::status::ServerStatus;

/// Receives human-readable status notices from the server.
///
/// Infrastructure implementations log them or forward them to a UI channel;
/// test implementations record them.  `publish` is called from the delivery
/// loop and from per-connection tasks, so it must return quickly and must not
/// block on I/O.
#[cfg_attr(test, mockall::automock)]
pub trait StatusSink: Send + Sync {
    fn publish(&self, status: ServerStatus);
}
