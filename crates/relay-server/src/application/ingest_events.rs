//! The ingestion queue between the producer and the delivery loop.
//!
//! The producer is typically a system callback that must not be delayed, so
//! [`EventQueue::enqueue`] only appends to an unbounded buffer: it never waits
//! for a lock held across I/O, never waits for the consumer, and can be called
//! from any thread, with or without a Tokio runtime.
//!
//! There is exactly one consumer, [`EventReceiver`], owned by the delivery
//! loop.  One queue plus one consumer is what gives the global FIFO order: an
//! event enqueued before another is delivered before it, to every subscriber.
//!
//! # Back-pressure
//!
//! None.  The channel is unbounded, so `enqueue` neither blocks the producer
//! nor drops events; a backlog only grows while a slow subscriber is waiting
//! out its write timeout.
//!
//! # Settling
//!
//! An event is *unsettled* from the moment it is enqueued until the delivery
//! loop has finished broadcasting it (or discarded it).  [`EventQueue::settled`]
//! waits for that count to reach zero, which is what a producer that is about
//! to stop the server uses to make sure its last events went out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use relay_core::ForwardedEvent;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

/// Why an event was not accepted for forwarding.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum IngestError {
    /// The server is not listening; the event was discarded.
    #[error("not_running")]
    NotRunning,
}

impl IngestError {
    /// Stable machine-readable reason string.
    pub fn reason(self) -> &'static str {
        match self {
            Self::NotRunning => "not_running",
        }
    }
}

/// Creates a connected queue / receiver pair.
pub fn ingestion_queue() -> (EventQueue, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let backlog = Arc::new(Backlog::default());
    (
        EventQueue {
            tx,
            backlog: Arc::clone(&backlog),
        },
        EventReceiver { rx, backlog },
    )
}

/// Counters shared by both ends of the queue.
#[derive(Debug, Default)]
struct Backlog {
    /// Buffered and not yet taken by the consumer.
    depth: AtomicUsize,
    /// Enqueued and not yet broadcast or discarded.
    unsettled: AtomicUsize,
    settled: Notify,
}

impl Backlog {
    fn settle(&self, n: usize) {
        if n > 0 && self.unsettled.fetch_sub(n, Ordering::AcqRel) == n {
            self.settled.notify_waiters();
        }
    }
}

/// Producer side of the queue.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<ForwardedEvent>,
    backlog: Arc<Backlog>,
}

impl EventQueue {
    /// Appends an event without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::NotRunning`] if the receiver has been closed or
    /// dropped, i.e. the delivery loop is gone.
    pub fn enqueue(&self, event: ForwardedEvent) -> Result<(), IngestError> {
        // Count first so the consumer can never observe a negative depth.
        self.backlog.unsettled.fetch_add(1, Ordering::AcqRel);
        self.backlog.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(event).map_err(|_| {
            self.backlog.depth.fetch_sub(1, Ordering::AcqRel);
            self.backlog.settle(1);
            IngestError::NotRunning
        })
    }

    /// Number of events buffered and not yet taken by the consumer.
    pub fn len(&self) -> usize {
        self.backlog.depth.load(Ordering::Acquire)
    }

    /// Number of events enqueued and not yet broadcast or discarded.
    ///
    /// Unlike [`len`](Self::len) this includes the event being broadcast.
    pub fn unsettled(&self) -> usize {
        self.backlog.unsettled.load(Ordering::Acquire)
    }

    /// Waits until every event enqueued so far has been broadcast or
    /// discarded.
    ///
    /// Events enqueued while waiting are waited for too.
    pub async fn settled(&self) {
        loop {
            // Register before checking so a concurrent settle cannot be missed.
            let notified = self.backlog.settled.notified();
            if self.unsettled() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the consumer side has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the queue, owned by the delivery loop.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ForwardedEvent>,
    backlog: Arc<Backlog>,
}

impl EventReceiver {
    /// Waits for the next event in FIFO order.
    ///
    /// Returns `None` once every [`EventQueue`] handle is dropped and the
    /// buffer is empty.  Cancel-safe: dropping the future never loses an event.
    pub async fn dequeue(&mut self) -> Option<ForwardedEvent> {
        let event = self.rx.recv().await?;
        self.backlog.depth.fetch_sub(1, Ordering::AcqRel);
        Some(event)
    }

    /// Marks one dequeued event as fully handled.
    ///
    /// The delivery loop calls this after each broadcast, whatever its outcome.
    pub fn settle(&self) {
        self.backlog.settle(1);
    }

    /// Closes the queue and discards everything still buffered.
    ///
    /// After this call every `enqueue` fails with [`IngestError::NotRunning`].
    /// Returns the number of discarded events.
    pub fn drain(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            self.backlog.depth.fetch_sub(1, Ordering::AcqRel);
            discarded += 1;
        }
        self.backlog.settle(discarded);
        discarded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
