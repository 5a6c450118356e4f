//! The connection registry: every subscriber currently eligible for events.
//!
//! # Two writers, one map
//!
//! The acceptor inserts connections; the delivery loop and the per-connection
//! disconnect watchers remove them.  The map lives behind a short
//! `parking_lot::Mutex` that is never held across an `.await`:
//!
//! - [`ConnectionRegistry::add`] inserts and returns immediately.
//! - [`ConnectionRegistry::remove`] takes the entry out under the lock, then
//!   closes it *after* releasing the lock.
//! - [`ConnectionRegistry::snapshot`] clones the current members (cheap
//!   `Arc` clones) so a broadcast iterates a stable list while the live map
//!   keeps changing.  A subscriber that registers mid-broadcast simply misses
//!   that one broadcast.
//!
//! Socket writes never happen under the registry lock; each connection has its
//! own async writer lock instead, so a slow subscriber only ever delays itself
//! and the delivery loop's bounded write to it.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Identifies one registered connection.  A device may hold several.
pub type ConnectionId = Uuid;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One accepted subscriber connection and its outbound write handle.
pub struct ClientConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    connected_at: Instant,
    // `None` once the connection has been closed.
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    closed: CancellationToken,
}

impl ClientConnection {
    /// Wraps the write half of an accepted connection.
    ///
    /// `closed` is cancelled when the connection is closed, which lets the
    /// task owning the read half stop and release the transport.
    pub fn new<W>(peer_addr: SocketAddr, writer: W, closed: CancellationToken) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            connected_at: Instant::now(),
            writer: tokio::sync::Mutex::new(Some(Box::new(writer))),
            closed,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Cancelled once this connection has been closed.
    pub fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Writes one encoded line and flushes it.
    ///
    /// # Errors
    ///
    /// Any I/O error from the write or the flush, or `NotConnected` if the
    /// connection was already closed.
    pub async fn send_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        write_line(&mut writer, line).await
    }

    /// Closes the write handle and signals the reader to release the transport.
    ///
    /// Idempotent.
    pub async fn close(&self) {
        self.closed.cancel();
        // Dropping the write half shuts down our side of the socket.
        drop(self.writer.lock().await.take());
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn write_line(writer: &mut Option<BoxedWriter>, line: &[u8]) -> io::Result<()> {
    let writer = writer
        .as_mut()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection closed"))?;
    writer.write_all(line).await?;
    writer.flush().await
}

/// The live set of registered subscriber connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: Mutex<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a connection unconditionally and returns the new member count.
    pub fn add(&self, conn: Arc<ClientConnection>) -> usize {
        let mut clients = self.clients.lock();
        clients.insert(conn.id(), conn);
        clients.len()
    }

    /// Registers a new connection and writes `handshake` as its first line.
    ///
    /// The connection's writer is held while it is inserted, so a broadcast
    /// that snapshots the new member has to wait until the handshake is on the
    /// wire: no event can overtake it.  Returns the new member count.
    ///
    /// # Errors
    ///
    /// Returns the handshake write error.  The connection stays registered;
    /// the caller is expected to [`remove`](Self::remove) it.
    pub async fn register(&self, conn: Arc<ClientConnection>, handshake: &[u8]) -> io::Result<usize> {
        let mut writer = conn.writer.lock().await;
        let count = self.add(Arc::clone(&conn));
        write_line(&mut writer, handshake).await?;
        Ok(count)
    }

    /// Removes a connection and closes it.
    ///
    /// Returns `false` if it was not registered (already removed); calling it
    /// twice is harmless.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.clients.lock().remove(&id);
        match removed {
            Some(conn) => {
                conn.close().await;
                debug!(peer = %conn.peer_addr(), "connection removed from registry");
                true
            }
            None => false,
        }
    }

    /// Clones the current member list for one broadcast cycle.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.clients.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and closes every connection.  Returns how many were closed.
    pub async fn clear(&self) -> usize {
        let drained: Vec<_> = self.clients.lock().drain().map(|(_, conn)| conn).collect();
        for conn in &drained {
            conn.close().await;
        }
        drained.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
