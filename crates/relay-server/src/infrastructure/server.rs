//! ForwardingServer: the lifecycle controller.
//!
//! Owns the listener, the acceptor task, the delivery loop, and the ingestion
//! queue as one unit, and moves the server through
//! `Stopped → Starting → Listening → Stopping → Stopped`.
//!
//! # Concurrency model
//!
//! ```text
//!                      ┌──────────────────────────┐
//!  ingest() ──────────►│ shared (parking_lot)     │  state, address, queue
//!  (any thread, sync)  └──────────────────────────┘
//!                      ┌──────────────────────────┐
//!  start() / stop() ──►│ running (tokio Mutex)    │  tasks + cancellation token
//!                      └──────────────────────────┘
//! ```
//!
//! `start` and `stop` serialize on the async `running` lock, so two
//! overlapping calls can never bind twice or tear down twice.  `ingest` never
//! touches that lock: it only reads the short `shared` lock and appends to the
//! unbounded queue, so a producer is never delayed by a start or stop in
//! progress.
//!
//! # Stopping
//!
//! 1. The queue handle is dropped from `shared` and the state becomes
//!    `Stopping`; from here on `ingest` returns `not_running`.
//! 2. The cancellation token fires.  The acceptor exits and drops the
//!    listener; the delivery loop finishes the broadcast in flight, then
//!    drains and discards the backlog.
//! 3. Both tasks are awaited, then every per-connection task.
//! 4. The registry is cleared, closing every remaining connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relay_core::{encode_line, ControlMessage, ForwardedEvent, ProtocolError, ServerMessage};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::application::deliver_events::{DeliveryLoop, DeliveryReport};
use crate::application::ingest_events::{ingestion_queue, EventQueue, IngestError};
use crate::application::manage_connections::ConnectionRegistry;
use crate::application::publish_status::StatusSink;
use crate::domain::config::{InvalidConfig, ServerConfig};
use crate::domain::status::{ServerState, ServerStatus};
use crate::infrastructure::network::{advertised_addr, Acceptor, AcceptorConfig};

/// Why [`ForwardingServer::start`] failed.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configuration cannot be used to run the server.
    #[error(transparent)]
    Config(#[from] InvalidConfig),

    /// Binding the listening socket failed (port in use, permission denied).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The bound socket could not report its own address.
    #[error("could not read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),

    /// The handshake line could not be encoded.
    #[error("could not encode handshake: {0}")]
    Handshake(#[from] ProtocolError),
}

#[derive(Debug, Default)]
struct Shared {
    state: ServerState,
    address: Option<SocketAddr>,
    queue: Option<EventQueue>,
}

/// Everything that exists only while the server is listening.
struct RunningServer {
    cancel: CancellationToken,
    acceptor: JoinHandle<()>,
    delivery: JoinHandle<DeliveryReport>,
    connections: TaskTracker,
}

/// The event forwarding server.
///
/// Construct once and share it (usually as `Arc<ForwardingServer>`) with
/// whatever produces events and whatever drives start/stop.  There is no
/// global instance.
pub struct ForwardingServer {
    config: ServerConfig,
    status: Arc<dyn StatusSink>,
    registry: Arc<ConnectionRegistry>,
    shared: Mutex<Shared>,
    running: tokio::sync::Mutex<Option<RunningServer>>,
}

impl ForwardingServer {
    /// Creates a stopped server.  Nothing is bound until [`start`](Self::start).
    pub fn new(config: ServerConfig, status: Arc<dyn StatusSink>) -> Self {
        Self {
            config,
            status,
            registry: Arc::new(ConnectionRegistry::new()),
            shared: Mutex::new(Shared::default()),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Binds the listener and launches the acceptor and delivery loop.
    ///
    /// Returns `Ok(())` without doing anything if the server is already
    /// listening.
    ///
    /// # Errors
    ///
    /// Any failure leaves the server `Stopped`, is published to the status
    /// sink as `Error: …`, and is returned.  Nothing is retried.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("start ignored: already listening");
            return Ok(());
        }
        self.shared.lock().state = ServerState::Starting;

        match self.launch().await {
            Ok((server, address)) => {
                *running = Some(server);
                info!(%address, "forwarding server listening");
                self.status.publish(ServerStatus::Listening(address));
                Ok(())
            }
            Err(e) => {
                self.shared.lock().state = ServerState::Stopped;
                error!("failed to start forwarding server: {e}");
                self.status.publish(ServerStatus::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn launch(&self) -> Result<(RunningServer, SocketAddr), ServerError> {
        self.config.validate()?;
        let handshake_line = encode_line(&ServerMessage::from(ControlMessage::handshake(
            self.config.platform_version.as_str(),
        )))?;

        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let bound = listener.local_addr().map_err(ServerError::LocalAddr)?;
        let address = advertised_addr(bound);
        debug!(%bound, %address, "listener bound");

        let cancel = CancellationToken::new();
        let connections = TaskTracker::new();
        let (queue, receiver) = ingestion_queue();

        let delivery = DeliveryLoop::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.status),
            self.config.write_timeout,
        );
        let delivery = tokio::spawn(delivery.run(receiver, cancel.clone()));

        let acceptor = Acceptor::new(
            listener,
            Arc::clone(&self.registry),
            Arc::clone(&self.status),
            AcceptorConfig {
                handshake_line,
                write_timeout: self.config.write_timeout,
                retry_delay: self.config.accept_retry_delay,
            },
            connections.clone(),
        );
        let acceptor = tokio::spawn(acceptor.run(cancel.clone()));

        {
            let mut shared = self.shared.lock();
            shared.state = ServerState::Listening;
            shared.address = Some(address);
            shared.queue = Some(queue);
        }

        Ok((
            RunningServer {
                cancel,
                acceptor,
                delivery,
                connections,
            },
            address,
        ))
    }

    /// Closes the listener, stops every task, and closes every connection.
    ///
    /// Waits for all of it to finish before returning.  A no-op when the
    /// server is already stopped.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            debug!("stop ignored: not running");
            return;
        };

        {
            let mut shared = self.shared.lock();
            shared.state = ServerState::Stopping;
            shared.queue = None;
        }
        info!("stopping forwarding server");

        server.cancel.cancel();
        if let Err(e) = server.acceptor.await {
            warn!("acceptor task ended abnormally: {e}");
        }
        let report = server.delivery.await.unwrap_or_else(|e| {
            warn!("delivery task ended abnormally: {e}");
            DeliveryReport::default()
        });
        server.connections.close();
        server.connections.wait().await;
        let closed = self.registry.clear().await;

        {
            let mut shared = self.shared.lock();
            shared.state = ServerState::Stopped;
            shared.address = None;
        }
        info!(
            closed,
            events = report.events,
            discarded = report.discarded,
            "forwarding server stopped"
        );
        self.status.publish(ServerStatus::Stopped);
    }

    /// Hands an event to the server for delivery to every subscriber.
    ///
    /// Never blocks and never performs I/O; callable from any thread.
    ///
    /// # Errors
    ///
    /// [`IngestError::NotRunning`] unless the server is `Listening`.  The
    /// event is discarded.
    pub fn ingest(&self, event: ForwardedEvent) -> Result<(), IngestError> {
        let shared = self.shared.lock();
        match (&shared.state, &shared.queue) {
            (ServerState::Listening, Some(queue)) => queue.enqueue(event),
            _ => {
                debug!(app = event.source_app_name(), "event rejected: server not running");
                Err(IngestError::NotRunning)
            }
        }
    }

    /// `true` while starting or listening.
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn state(&self) -> ServerState {
        self.shared.lock().state
    }

    /// The address subscribers should connect to, while listening.
    pub fn current_address(&self) -> Option<SocketAddr> {
        self.shared.lock().address
    }

    /// Events accepted by [`ingest`](Self::ingest) and not yet broadcast.
    pub fn pending_events(&self) -> usize {
        self.shared.lock().queue.as_ref().map_or(0, EventQueue::len)
    }

    /// Waits until every accepted event has been broadcast, for at most `limit`.
    ///
    /// [`stop`](Self::stop) discards whatever is still queued, so a producer
    /// that wants its last events delivered calls this first.  Returns `true`
    /// once nothing is left in flight (immediately when not listening) and
    /// `false` if `limit` elapsed first.
    pub async fn flush(&self, limit: Duration) -> bool {
        let Some(queue) = self.shared.lock().queue.clone() else {
            return true;
        };
        match timeout(limit, queue.settled()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    unsettled = queue.unsettled(),
                    "events still in flight after {limit:?}"
                );
                false
            }
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Drop for ForwardingServer {
    fn drop(&mut self) {
        // Dropped without stop(): at least let the background tasks exit.
        if let Some(server) = self.running.get_mut() {
            server.cancel.cancel();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::publish_status::MockStatusSink;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpStream;

    fn quiet_sink() -> Arc<dyn StatusSink> {
        let mut sink = MockStatusSink::new();
        sink.expect_publish().return_const(());
        Arc::new(sink)
    }

    fn event() -> ForwardedEvent {
        ForwardedEvent::new("Mail", "Hi", "body", "com.mail")
    }

    #[tokio::test]
    async fn test_new_server_is_stopped() {
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), quiet_sink());

        assert_eq!(server.state(), ServerState::Stopped);
        assert!(!server.is_running());
        assert!(server.current_address().is_none());
    }

    #[tokio::test]
    async fn test_start_publishes_listening_with_bound_port() {
        // Arrange
        let mut sink = MockStatusSink::new();
        sink.expect_publish()
            .withf(|s| matches!(s, ServerStatus::Listening(addr) if addr.port() != 0))
            .times(1)
            .return_const(());
        sink.expect_publish()
            .withf(|s| *s == ServerStatus::Stopped)
            .times(1)
            .return_const(());
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), Arc::new(sink));

        // Act
        server.start().await.unwrap();

        // Assert
        assert_eq!(server.state(), ServerState::Listening);
        assert!(server.current_address().unwrap().ip().is_loopback());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_ingest_while_listening_is_accepted() {
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), quiet_sink());
        server.start().await.unwrap();

        assert_eq!(server.ingest(event()), Ok(()));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_ingest_while_stopped_is_not_running() {
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), quiet_sink());

        let result = server.ingest(event());

        assert_eq!(result, Err(IngestError::NotRunning));
        assert_eq!(server.pending_events(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_start_and_stays_stopped() {
        // Arrange
        let config = ServerConfig {
            write_timeout: Duration::ZERO,
            ..ServerConfig::loopback_ephemeral()
        };
        let mut sink = MockStatusSink::new();
        sink.expect_publish()
            .withf(|s| matches!(s, ServerStatus::Error(_)))
            .times(1)
            .return_const(());
        let server = ForwardingServer::new(config, Arc::new(sink));

        // Act
        let result = server.start().await;

        // Assert
        assert!(matches!(result, Err(ServerError::Config(_))));
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_publishes_nothing() {
        let mut sink = MockStatusSink::new();
        sink.expect_publish().never();
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), Arc::new(sink));

        server.stop().await;

        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_flush_when_stopped_returns_immediately() {
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), quiet_sink());

        assert!(server.flush(Duration::from_millis(10)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_flush_then_stop_delivers_every_accepted_event() {
        // Arrange
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), quiet_sink());
        server.start().await.unwrap();
        let addr = server.current_address().unwrap();
        let mut subscriber = BufReader::new(TcpStream::connect(addr).await.unwrap());
        let mut handshake = String::new();
        subscriber.read_line(&mut handshake).await.unwrap();

        // Act: ingest and stop back to back, as a producer at end of input does.
        for n in 0..3 {
            server
                .ingest(ForwardedEvent::clipboard(format!("line {n}")))
                .unwrap();
        }
        let flushed = server.flush(Duration::from_secs(5)).await;
        server.stop().await;

        // Assert
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if subscriber.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            lines.push(line);
        }
        assert!(flushed);
        assert_eq!(lines.len(), 3, "got {lines:?}");
        assert!(lines[2].contains("line 2"));
    }

    #[tokio::test]
    async fn test_server_can_restart_after_stop() {
        let server = ForwardingServer::new(ServerConfig::loopback_ephemeral(), quiet_sink());

        server.start().await.unwrap();
        server.stop().await;
        server.start().await.unwrap();

        assert_eq!(server.state(), ServerState::Listening);
        assert_eq!(server.ingest(event()), Ok(()));
        server.stop().await;
    }
}
