//! Infrastructure layer for relay-client.

pub mod network;
