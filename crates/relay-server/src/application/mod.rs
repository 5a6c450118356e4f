//! Application layer for relay-server.
//!
//! Knows *what* happens to an event between the producer and the sockets,
//! and delegates *how* bytes reach the network to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - The unbounded ingestion queue between producer and delivery loop
//! - The connection registry and its snapshot-then-iterate discipline
//! - The delivery loop: serialize once, fan out, evict failing subscribers
//! - The `StatusSink` port through which status text leaves the server
//!
//! # What does NOT belong here?
//!
//! - Binding or accepting sockets (infrastructure)
//! - Starting and stopping tasks (the lifecycle controller in infrastructure)

pub mod deliver_events;
pub mod ingest_events;
pub mod manage_connections;
pub mod publish_status;

pub use deliver_events::{BroadcastOutcome, DeliveryLoop, DeliveryReport};
pub use ingest_events::{ingestion_queue, EventQueue, EventReceiver, IngestError};
pub use manage_connections::{ClientConnection, ConnectionId, ConnectionRegistry};
pub use publish_status::StatusSink;
