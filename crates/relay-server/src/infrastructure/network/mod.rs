//! Network adapters: the subscriber acceptor and local address discovery.

pub mod acceptor;
pub mod local_addr;

pub use acceptor::{Acceptor, AcceptorConfig, SubscriberListener};
pub use local_addr::{advertised_addr, primary_ipv4};
