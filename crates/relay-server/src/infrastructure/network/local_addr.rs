//! LAN address discovery for the status surface.
//!
//! When the listener binds `0.0.0.0`, "Listening on 0.0.0.0:12345" is useless
//! to a user who needs to type an address into a subscriber.  This module
//! finds the address other LAN hosts can actually reach.
//!
//! # How the route probe works
//!
//! Connecting a UDP socket sends no packets; it only asks the OS routing table
//! which local interface would be used to reach the target.  Reading back the
//! socket's local address therefore yields the primary outbound IPv4 address
//! without any network traffic.  If there is no route (no network at all), the
//! probe fails and the caller falls back to the bound address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

/// Any routable address works; nothing is ever sent to it.
const ROUTE_PROBE_TARGET: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 80);

/// Returns the host's primary non-loopback IPv4 address, if it has one.
pub fn primary_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    if let Err(e) = socket.connect(ROUTE_PROBE_TARGET) {
        debug!("route probe failed: {e}");
        return None;
    }
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// The address subscribers should be told to connect to.
///
/// Specific bind addresses are returned unchanged.  An unspecified bind
/// address is replaced by [`primary_ipv4`] when one is found.
pub fn advertised_addr(bound: SocketAddr) -> SocketAddr {
    if bound.ip().is_unspecified() {
        if let Some(ip) = primary_ipv4() {
            return SocketAddr::new(IpAddr::V4(ip), bound.port());
        }
    }
    bound
}

// ── Tests ─────────────────────────────────────────────────────────────────────
