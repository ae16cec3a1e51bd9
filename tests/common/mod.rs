//! Common test utilities for integration tests.
//!
//! Provides a local WebSocket server driven step by step from the test
//! body, plus configuration with backoff short enough for real timers.

#![allow(dead_code)]

use std::time::Duration;

use dashwire::config::DashwireConfig;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Upper bound for any single wait in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Config whose reconnect delays are 20ms, 40ms, 80ms, ... capped at 200ms.
pub fn fast_config() -> DashwireConfig {
    DashwireConfig::new().with_backoff(Duration::from_millis(20), Duration::from_millis(200))
}

/// WebSocket server on an ephemeral localhost port.
pub struct WsServer {
    listener: TcpListener,
    url: String,
}

impl WsServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        Self {
            listener,
            url: format!("ws://{}", addr),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Accept the next client and complete the WebSocket handshake.
    pub async fn accept(&self) -> WebSocketStream<TcpStream> {
        let (stream, _) = tokio::time::timeout(TEST_TIMEOUT, self.listener.accept())
            .await
            .expect("client should connect")
            .expect("accept tcp connection");
        accept_async(stream).await.expect("websocket handshake")
    }

    /// Accept the next TCP connection and drop it before the handshake.
    pub async fn accept_and_drop(&self) {
        let (stream, _) = tokio::time::timeout(TEST_TIMEOUT, self.listener.accept())
            .await
            .expect("client should connect")
            .expect("accept tcp connection");
        drop(stream);
    }

    /// Try to accept within `wait`; `false` if nobody connected.
    pub async fn accepts_within(&self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.listener.accept()).await.is_ok()
    }
}

/// Next text frame sent by the client.
pub async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let frame = tokio::time::timeout(TEST_TIMEOUT, ws.next())
            .await
            .expect("client frame within timeout")
            .expect("socket still open")
            .expect("valid frame");
        if let Message::Text(text) = frame {
            return text;
        }
    }
}
