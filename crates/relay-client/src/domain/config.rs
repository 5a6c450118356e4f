//! Subscriber configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port relay servers listen on unless configured otherwise.
pub const DEFAULT_SERVER_PORT: u16 = 12345;

/// Where to connect and how long to wait for data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// Address of the relay server.
    pub server_addr: SocketAddr,

    /// Upper bound on waiting for any single line, handshake included.
    ///
    /// `None` waits indefinitely; events can be hours apart, so only set
    /// this when silence should be treated as a failure.
    pub read_timeout: Option<Duration>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_SERVER_PORT),
            read_timeout: None,
        }
    }
}

impl SubscriberConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            ..Self::default()
        }
    }
}
