//! Domain layer for relay-client.

pub mod config;

pub use config::SubscriberConfig;
