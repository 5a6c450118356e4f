//! Helpers shared by the relay-server integration tests.
//!
//! Every test binds `127.0.0.1:0` so tests never collide with each other or
//! with a real server on port 12345.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_server::infrastructure::status_sink::ChannelStatusSink;
use relay_server::{ForwardingServer, ServerConfig, ServerStatus};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};

/// How long a test waits for something that should happen promptly.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// A started server plus the stream of statuses it has published.
pub struct TestServer {
    pub server: Arc<ForwardingServer>,
    pub statuses: UnboundedReceiver<ServerStatus>,
    pub addr: SocketAddr,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::loopback_ephemeral()).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let (sink, statuses) = ChannelStatusSink::new();
        let server = Arc::new(ForwardingServer::new(config, Arc::new(sink)));
        server.start().await.expect("server should start");
        let addr = server.current_address().expect("listening server has an address");
        Self {
            server,
            statuses,
            addr,
        }
    }

    /// Everything published so far, without waiting.
    pub fn published(&mut self) -> Vec<ServerStatus> {
        let mut out = Vec::new();
        while let Ok(status) = self.statuses.try_recv() {
            out.push(status);
        }
        out
    }

    /// Waits until the registry holds exactly `n` connections.
    pub async fn wait_for_clients(&self, n: usize) {
        let registry = Arc::clone(self.server.registry());
        wait_until(|| registry.len() == n).await;
    }
}

/// A raw subscriber that has already consumed its handshake line.
pub struct TestSubscriber {
    reader: BufReader<OwnedReadHalf>,
    // Held so the server does not see our side close.
    _writer: OwnedWriteHalf,
    pub handshake: Value,
}

impl TestSubscriber {
    /// Connects and reads the handshake.  Once this returns, the connection
    /// is registered and will receive every event enqueued from now on.
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read, write) = stream.into_split();
        let mut sub = Self {
            reader: BufReader::new(read),
            _writer: write,
            handshake: Value::Null,
        };
        sub.handshake = sub.next_json().await;
        sub
    }

    /// Reads one line, failing the test if none arrives in time.
    pub async fn next_line(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(PATIENCE, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .expect("read failed");
        assert!(n > 0, "connection closed while waiting for a line");
        line
    }

    pub async fn next_json(&mut self) -> Value {
        let line = self.next_line().await;
        assert!(line.ends_with('\n'), "line must be newline-terminated: {line:?}");
        serde_json::from_str(&line).expect("line must be one JSON object")
    }

    /// Asserts that nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        let mut line = String::new();
        if let Ok(result) = timeout(window, self.reader.read_line(&mut line)).await {
            match result {
                Ok(0) => {}
                Ok(_) => panic!("unexpected line: {line:?}"),
                Err(e) => panic!("read failed: {e}"),
            }
        }
    }

    /// Discards lines until the server closes the connection.  Returns how
    /// many lines were discarded.
    pub async fn read_until_closed(&mut self) -> usize {
        let mut discarded = 0;
        loop {
            let mut line = String::new();
            let read = timeout(PATIENCE, self.reader.read_line(&mut line))
                .await
                .expect("connection should be closed promptly");
            match read {
                Ok(0) | Err(_) => return discarded,
                Ok(_) => discarded += 1,
            }
        }
    }
}

/// Polls `check` every 10 ms until it holds, failing after [`PATIENCE`].
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + PATIENCE;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {PATIENCE:?}"
        );
        sleep(Duration::from_millis(10)).await;
    }
}
