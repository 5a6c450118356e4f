//! DeliverEventsUseCase: the single consumer of the ingestion queue.
//!
//! For every event, in queue order:
//!
//! 1. Serialize it once to its wire line (`{...}\n`).
//! 2. Take a registry snapshot.
//! 3. Write the line to each member in turn, each write bounded by the
//!    configured write timeout.
//! 4. Evict every member whose write (or flush) failed or timed out, then
//!    publish the new client count if anything was evicted.
//!
//! One failing subscriber never affects the others: it is removed and the
//! loop moves on to the next member of the same snapshot.  Evicted
//! subscribers are not retried and the event is not requeued.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{encode_line, ForwardedEvent, ProtocolError, ServerMessage};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ingest_events::EventReceiver;
use crate::application::manage_connections::ConnectionRegistry;
use crate::application::publish_status::StatusSink;
use crate::domain::status::ServerStatus;

/// Result of broadcasting one event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Members that received the line.
    pub delivered: usize,
    /// Members removed because their write failed.
    pub evicted: usize,
}

/// Summary returned when the delivery loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Events taken off the queue and broadcast (including to zero members).
    pub events: u64,
    /// Events still buffered at shutdown and discarded.
    pub discarded: usize,
}

/// Fans events out to the registry.
pub struct DeliveryLoop {
    registry: Arc<ConnectionRegistry>,
    status: Arc<dyn StatusSink>,
    write_timeout: Duration,
}

impl DeliveryLoop {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        status: Arc<dyn StatusSink>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            status,
            write_timeout,
        }
    }

    /// Runs until `cancel` fires or every queue handle is dropped.
    ///
    /// Cancellation is checked before each wait for the next event; a
    /// broadcast already in progress finishes first.  On exit the queue is
    /// closed and whatever is still buffered is discarded.
    pub async fn run(self, mut events: EventReceiver, cancel: CancellationToken) -> DeliveryReport {
        info!("delivery loop started");
        let mut report = DeliveryReport::default();

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = events.dequeue() => match next {
                    Some(event) => event,
                    None => break,
                },
            };

            self.broadcast(&event).await;
            events.settle();
            report.events += 1;
        }

        report.discarded = events.drain();
        info!(
            events = report.events,
            discarded = report.discarded,
            "delivery loop stopped"
        );
        report
    }

    /// Sends one event to every member of the current registry snapshot.
    pub async fn broadcast(&self, event: &ForwardedEvent) -> BroadcastOutcome {
        let line = match encode_line(&ServerMessage::from(event)) {
            Ok(line) => line,
            Err(e) => {
                self.report_unencodable(event, &e);
                return BroadcastOutcome::default();
            }
        };

        let members = self.registry.snapshot();
        if members.is_empty() {
            debug!(app = event.source_app_name(), "no subscribers; event discarded");
            return BroadcastOutcome::default();
        }

        debug!(
            app = event.source_app_name(),
            clients = members.len(),
            "broadcasting event"
        );

        let mut outcome = BroadcastOutcome::default();
        for conn in members {
            let failure = match timeout(self.write_timeout, conn.send_line(line.as_bytes())).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("write timed out after {:?}", self.write_timeout)),
            };

            match failure {
                None => outcome.delivered += 1,
                Some(reason) => {
                    warn!(peer = %conn.peer_addr(), "evicting subscriber: {reason}");
                    // A disconnect watcher may have removed it already.
                    if self.registry.remove(conn.id()).await {
                        outcome.evicted += 1;
                    }
                }
            }
        }

        if outcome.evicted > 0 {
            self.status.publish(ServerStatus::Clients(self.registry.len()));
        }
        outcome
    }

    /// The event is dropped; the loop carries on with the next one.
    fn report_unencodable(&self, event: &ForwardedEvent, e: &ProtocolError) {
        error!(app = event.source_app_name(), "dropping event that failed to serialize: {e}");
        self.status
            .publish(ServerStatus::Error(format!("could not serialize event: {e}")));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
