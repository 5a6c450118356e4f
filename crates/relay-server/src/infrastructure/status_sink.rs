//! [`StatusSink`] adapters.
//!
//! - [`LogStatusSink`] writes every status to the `tracing` log; it is what
//!   the `relay-server` binary uses as its status surface.
//! - [`ChannelStatusSink`] forwards every status into an unbounded channel so
//!   an embedding UI (or a test) can consume them asynchronously.

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::application::publish_status::StatusSink;
use crate::domain::status::ServerStatus;

/// Logs each status line at `info` (`error` for [`ServerStatus::Error`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&self, status: ServerStatus) {
        match &status {
            ServerStatus::Error(_) => error!(status = %status, "server status"),
            _ => info!(status = %status, "server status"),
        }
    }
}

/// Sends each status into a channel.  Publishing never blocks.
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<ServerStatus>,
}

impl ChannelStatusSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelStatusSink {
    fn publish(&self, status: ServerStatus) {
        // No receiver means nobody is watching; the status is simply dropped.
        let _ = self.tx.send(status);
    }
}
