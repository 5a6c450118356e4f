//! Subscriber acceptor: accept loop and per-connection tasks.
//!
//! This module is responsible for:
//!
//! 1. Accepting incoming TCP connections on an already-bound listener.
//! 2. Registering each connection and sending it the handshake line before it
//!    can receive any event.
//! 3. Watching each connection for EOF so a subscriber that hangs up is
//!    removed without waiting for a failed write.
//! 4. Closing the listener when the server's cancellation token fires.
//!
//! # Two ways for `accept()` to fail
//!
//! A transient error (e.g. too many open file descriptors) on a listener that
//! is still open is logged and retried after `retry_delay`.  Shutdown is not
//! an error at all: the accept loop races `accept()` against the cancellation
//! token, and when the token wins the loop exits and the listener is dropped,
//! which closes the socket.  The two paths never meet, so a stop can never be
//! mistaken for a fault and retried.

use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::application::manage_connections::{ClientConnection, ConnectionId, ConnectionRegistry};
use crate::application::publish_status::StatusSink;
use crate::domain::status::ServerStatus;

/// Settings the acceptor needs for every connection.
#[derive(Debug, Clone)]
pub struct AcceptorConfig {
    /// Pre-encoded handshake line, terminator included.
    pub handshake_line: String,
    /// Bound on the handshake write.
    pub write_timeout: Duration,
    /// Backoff after a transient accept error.
    pub retry_delay: Duration,
}

/// Source of inbound subscriber connections.
///
/// Implemented by [`TcpListener`]; tests substitute a mock to inject accept
/// failures.
#[cfg_attr(test, mockall::automock)]
pub trait SubscriberListener: Send + Sync + 'static {
    /// Polls for the next inbound connection.
    fn poll_accept<'a>(&self, cx: &mut Context<'a>) -> Poll<io::Result<(TcpStream, SocketAddr)>>;
}

impl SubscriberListener for TcpListener {
    fn poll_accept<'a>(&self, cx: &mut Context<'a>) -> Poll<io::Result<(TcpStream, SocketAddr)>> {
        TcpListener::poll_accept(self, cx)
    }
}

/// Owns the listening socket for as long as the server is listening.
pub struct Acceptor<L = TcpListener> {
    listener: L,
    registry: Arc<ConnectionRegistry>,
    status: Arc<dyn StatusSink>,
    config: AcceptorConfig,
    connections: TaskTracker,
}

impl<L: SubscriberListener> Acceptor<L> {
    /// `connections` tracks the per-connection tasks so the lifecycle
    /// controller can wait for them during stop.
    pub fn new(
        listener: L,
        registry: Arc<ConnectionRegistry>,
        status: Arc<dyn StatusSink>,
        config: AcceptorConfig,
        connections: TaskTracker,
    ) -> Self {
        Self {
            listener,
            registry,
            status,
            config,
            connections,
        }
    }

    /// Runs the accept loop until `cancel` fires, then closes the listener.
    pub async fn run(self, cancel: CancellationToken) {
        let handshake: Arc<str> = Arc::from(self.config.handshake_line.as_str());

        loop {
            let accepted = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                accepted = poll_fn(|cx| self.listener.poll_accept(cx)) => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "subscriber connected");
                    self.connections.spawn(serve_subscriber(
                        stream,
                        peer,
                        Arc::clone(&self.registry),
                        Arc::clone(&self.status),
                        Arc::clone(&handshake),
                        self.config.write_timeout,
                        cancel.child_token(),
                    ));
                }
                Err(e) => {
                    warn!(
                        "accept error: {e}; retrying in {:?}",
                        self.config.retry_delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(self.config.retry_delay) => {}
                    }
                }
            }
        }

        drop(self.listener);
        info!("listener closed; accept loop stopped");
    }
}

// ── Per-connection task ───────────────────────────────────────────────────────

/// Registers one subscriber, sends its handshake, then watches for hang-up.
async fn serve_subscriber(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    status: Arc<dyn StatusSink>,
    handshake: Arc<str>,
    write_timeout: Duration,
    closed: CancellationToken,
) {
    // The server may have started stopping between accept and this task.
    if closed.is_cancelled() {
        return;
    }

    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, "could not disable Nagle: {e}");
    }

    let (reader, writer) = stream.into_split();
    let conn = Arc::new(ClientConnection::new(peer, writer, closed.clone()));
    let id = conn.id();

    match timeout(write_timeout, registry.register(conn, handshake.as_bytes())).await {
        Ok(Ok(count)) => {
            debug!(%peer, clients = count, "handshake sent");
            status.publish(ServerStatus::Clients(count));
        }
        Ok(Err(e)) => {
            warn!(%peer, "handshake failed: {e}");
            evict(&registry, status.as_ref(), id).await;
            return;
        }
        Err(_) => {
            warn!(%peer, "handshake timed out after {write_timeout:?}");
            evict(&registry, status.as_ref(), id).await;
            return;
        }
    }

    if watch_for_hangup(reader, peer, &closed).await {
        evict(&registry, status.as_ref(), id).await;
    }
}

/// Reads and discards inbound bytes until the peer hangs up or `closed` fires.
///
/// Subscribers are not expected to send anything.  Returns `true` when the
/// peer went away, `false` when the connection was closed from our side.
async fn watch_for_hangup(
    mut reader: OwnedReadHalf,
    peer: SocketAddr,
    closed: &CancellationToken,
) -> bool {
    let mut buf = [0u8; 512];
    loop {
        tokio::select! {
            _ = closed.cancelled() => return false,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!(%peer, "subscriber disconnected");
                    return true;
                }
                Ok(n) => debug!(%peer, bytes = n, "ignoring inbound data"),
                Err(e) => {
                    info!(%peer, "subscriber connection error: {e}");
                    return true;
                }
            },
        }
    }
}

async fn evict(registry: &ConnectionRegistry, status: &dyn StatusSink, id: ConnectionId) {
    if registry.remove(id).await {
        status.publish(ServerStatus::Clients(registry.len()));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
