//! Integration tests for event delivery over real loopback connections.
//!
//! These tests verify, end to end:
//!
//! - FIFO fan-out: every subscriber receives every event in enqueue order.
//! - Late join: a subscriber only receives events enqueued after its
//!   handshake arrived.
//! - Eviction isolation: a subscriber that stops reading is evicted without
//!   affecting the others.
//! - The full connect / deliver / disconnect walkthrough with two
//!   subscribers.

mod common;

use std::time::Duration;

use common::{TestServer, TestSubscriber};
use relay_core::ForwardedEvent;
use relay_server::{ServerConfig, ServerStatus};
use serde_json::json;
use tokio::net::TcpStream;

fn event(n: usize) -> ForwardedEvent {
    ForwardedEvent::new("Mail", format!("message {n}"), "body", "com.mail")
}

#[tokio::test]
async fn test_fifo_fan_out_to_every_subscriber() {
    // Arrange
    let t = TestServer::start().await;
    let mut subs = Vec::new();
    for _ in 0..3 {
        subs.push(TestSubscriber::connect(t.addr).await);
    }

    // Act
    for n in 0..50 {
        t.server.ingest(event(n)).unwrap();
    }

    // Assert
    for sub in &mut subs {
        for n in 0..50 {
            assert_eq!(sub.next_json().await["title"], format!("message {n}"));
        }
    }
    t.server.stop().await;
}

#[tokio::test]
async fn test_late_joiner_only_sees_later_events() {
    // Arrange: A receives E1, so E1 has been dequeued before B connects.
    let t = TestServer::start().await;
    let mut a = TestSubscriber::connect(t.addr).await;
    t.server.ingest(event(1)).unwrap();
    assert_eq!(a.next_json().await["title"], "message 1");

    // Act
    let mut b = TestSubscriber::connect(t.addr).await;
    t.server.ingest(event(2)).unwrap();

    // Assert: B's first line after the handshake is E2.
    assert_eq!(b.next_json().await["title"], "message 2");
    assert_eq!(a.next_json().await["title"], "message 2");
    t.server.stop().await;
}

#[tokio::test]
async fn test_subscriber_that_stops_reading_is_evicted() {
    // Arrange: short write timeout and events large enough to fill the
    // stalled subscriber's socket buffers.
    let config = ServerConfig {
        write_timeout: Duration::from_secs(1),
        ..ServerConfig::loopback_ephemeral()
    };
    let mut t = TestServer::start_with(config).await;
    let stalled = TcpStream::connect(t.addr).await.unwrap();
    let mut healthy = TestSubscriber::connect(t.addr).await;
    t.wait_for_clients(2).await;

    let body = "x".repeat(256 * 1024);
    const EVENTS: usize = 128;

    // Act
    for n in 0..EVENTS {
        let e = ForwardedEvent::new("Big", format!("message {n}"), body.as_str(), "com.big");
        t.server.ingest(e).unwrap();
    }

    // Assert: the healthy subscriber gets everything, in order.
    for n in 0..EVENTS {
        assert_eq!(healthy.next_json().await["title"], format!("message {n}"));
    }
    t.wait_for_clients(1).await;
    let published = t.published();
    assert_eq!(
        published.last(),
        Some(&ServerStatus::Clients(1)),
        "eviction must publish the new count: {published:?}"
    );
    drop(stalled);
    t.server.stop().await;
}

#[tokio::test]
async fn test_event_with_icon_carries_base64() {
    let t = TestServer::start().await;
    let mut sub = TestSubscriber::connect(t.addr).await;

    t.server
        .ingest(ForwardedEvent::new("Chat", "Ping", "hey", "com.chat").with_icon(vec![1u8, 2, 3]))
        .unwrap();

    assert_eq!(
        sub.next_json().await,
        json!({"app": "Chat", "title": "Ping", "text": "hey", "packageName": "com.chat", "icon": "AQID"})
    );
    t.server.stop().await;
}

#[tokio::test]
async fn test_shared_text_is_forwarded_as_clipboard_event() {
    let t = TestServer::start().await;
    let mut sub = TestSubscriber::connect(t.addr).await;

    t.server.ingest(ForwardedEvent::clipboard("copied text")).unwrap();

    assert_eq!(
        sub.next_json().await,
        json!({"app": "Clipboard", "title": "Shared text", "text": "copied text", "packageName": "clipboard"})
    );
    t.server.stop().await;
}

#[tokio::test]
async fn test_two_subscriber_walkthrough() {
    // Arrange: server up, A connects and gets the handshake.
    let mut t = TestServer::start().await;
    let mut a = TestSubscriber::connect(t.addr).await;
    assert_eq!(a.handshake["type"], "status");
    assert_eq!(a.handshake["message"], "connected");

    // First event reaches A exactly as ingested.
    t.server.ingest(ForwardedEvent::new("Mail", "Hi", "body", "com.mail")).unwrap();
    assert_eq!(
        a.next_line().await,
        "{\"app\":\"Mail\",\"title\":\"Hi\",\"text\":\"body\",\"packageName\":\"com.mail\"}\n"
    );

    // B connects; the second event reaches both.
    let mut b = TestSubscriber::connect(t.addr).await;
    t.server.ingest(event(2)).unwrap();
    assert_eq!(a.next_json().await["title"], "message 2");
    assert_eq!(b.next_json().await["title"], "message 2");

    // A disconnects; the third event reaches only B.
    drop(a);
    t.wait_for_clients(1).await;
    t.server.ingest(event(3)).unwrap();
    assert_eq!(b.next_json().await["title"], "message 3");
    assert_eq!(t.server.registry().snapshot().len(), 1);

    let published = t.published();
    assert_eq!(
        published,
        vec![
            ServerStatus::Listening(t.addr),
            ServerStatus::Clients(1),
            ServerStatus::Clients(2),
            ServerStatus::Clients(1),
        ]
    );
    t.server.stop().await;
}
