use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::normalize::Event;
use super::state::{ConnectionState, ReconnectDecision};
use crate::config::DashwireConfig;
use crate::traits::EndpointResolver;

/// WebSocket connection errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Disconnected from server")]
    Disconnected,
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Callback invoked once per inbound normalized event.
pub type MessageHandler = Arc<dyn Fn(&Event) + Send + Sync>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Connect,
    Reconnect,
    Send(String),
    Subscribe(Vec<String>),
    SetHandler(Option<MessageHandler>),
    Shutdown,
}

/// Single logical connection to the server event socket.
///
/// Construct once at startup and hand it (or an `Arc` of it) to whatever
/// needs events. All socket state lives in a background task; this handle
/// only queues commands and reads published state, so every method is
/// fire-and-forget and never fails across the boundary.
///
/// Must be created inside a Tokio runtime.
pub struct StreamConnection {
    command_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    events_tx: broadcast::Sender<Event>,
}

impl StreamConnection {
    pub fn new(resolver: Arc<dyn EndpointResolver>, config: &DashwireConfig) -> Self {
        let state = ConnectionState::new(config.reconnect_policy());
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (events_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let actor = ConnectionActor {
            resolver,
            state,
            state_tx,
            events_tx: events_tx.clone(),
            handler: None,
            cached_url: None,
            socket: None,
            timer: None,
        };
        tokio::spawn(actor.run(command_rx));

        Self {
            command_tx,
            state_rx,
            events_tx,
        }
    }

    /// Ensure a connection exists. No effect while connected or while a
    /// reconnect is already scheduled.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Drop any socket and pending timer, forget the cached URL, reset
    /// backoff, then connect from scratch.
    pub fn reconnect(&self) {
        self.command(Command::Reconnect);
    }

    /// Serialize `message` and transmit it if the socket is open.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) {
        match serde_json::to_string(message) {
            Ok(json) => self.command(Command::Send(json)),
            Err(e) => error!("Failed to serialize outbound message: {}", e),
        }
    }

    /// Track `topics` and subscribe to them now (if connected) and after
    /// every reconnect.
    pub fn subscribe_to_topics<I, S>(&self, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics = topics.into_iter().map(Into::into).collect();
        self.command(Command::Subscribe(topics));
    }

    /// Register the message handler, replacing any previous one.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.command(Command::SetHandler(Some(Arc::new(handler))));
    }

    pub fn clear_message_handler(&self) {
        self.command(Command::SetHandler(None));
    }

    /// Receive every normalized event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected
    }

    pub fn last_message(&self) -> Option<Event> {
        self.state_rx.borrow().last_message.clone()
    }

    /// Snapshot of the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Close the socket, clear timers and stop the background task.
    pub fn shutdown(&self) {
        info!("Shutting down event socket connection");
        self.command(Command::Shutdown);
    }

    fn command(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            debug!("Connection task already stopped, dropping command");
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

/// Owns the socket, the reconnect timer and the state.
struct ConnectionActor {
    resolver: Arc<dyn EndpointResolver>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<Event>,
    handler: Option<MessageHandler>,
    cached_url: Option<String>,
    socket: Option<WsStream>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl ConnectionActor {
    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                frame = next_frame(&mut self.socket) => self.handle_frame(frame).await,
                () = wait_timer(&mut self.timer) => {
                    self.timer = None;
                    self.state.on_timer_fired();
                    info!(
                        "Reconnection attempt {} of {}",
                        self.state.reconnect_attempts,
                        self.state.policy().max_attempts
                    );
                    self.open().await;
                }
            }
        }

        self.teardown().await;
        debug!("Connection loop ended");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if self.socket.is_some() || self.timer.is_some() {
                    debug!("connect() ignored: already connected or reconnecting");
                } else if self.state.exhausted {
                    warn!("connect() ignored: reconnect budget exhausted, call reconnect()");
                } else {
                    self.open().await;
                }
            }
            Command::Reconnect => {
                info!("Manual reconnect requested");
                self.teardown().await;
                self.cached_url = None;
                self.state.reset_backoff();
                self.publish_state();
                self.open().await;
            }
            Command::Send(json) => match self.socket.as_mut() {
                Some(socket) => {
                    debug!("Sending: {}", json);
                    if let Err(e) = socket.send(Message::Text(json)).await {
                        warn!("{}", WsError::SendFailed(e.to_string()));
                    }
                }
                None => warn!("Dropping outbound message: {}", WsError::Disconnected),
            },
            Command::Subscribe(topics) => {
                self.state.set_topics(topics);
                self.publish_state();
                if self.socket.is_some() {
                    self.send_subscriptions().await;
                }
            }
            Command::SetHandler(handler) => self.handler = handler,
            Command::Shutdown => {}
        }
    }

    async fn handle_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.handle_text(&text),
            Some(Ok(Message::Ping(data))) => {
                if let Some(socket) = self.socket.as_mut() {
                    let _ = socket.send(Message::Pong(data)).await;
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("Received close frame from server");
                self.socket = None;
                self.schedule_reconnect();
            }
            Some(Ok(_)) => {
                // Binary, Pong and raw frames carry no events
            }
            Some(Err(e)) => {
                error!("WebSocket error: {}", e);
                self.socket = None;
                self.schedule_reconnect();
            }
            None => {
                info!("WebSocket stream ended");
                self.socket = None;
                self.schedule_reconnect();
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        match self.state.on_message(text, now_ms()) {
            Ok(event) => {
                debug!("Received {} event", event.kind);
                if let Some(handler) = &self.handler {
                    handler(&event);
                }
                let _ = self.events_tx.send(event);
                self.publish_state();
            }
            Err(e) => warn!("Dropping malformed message: {} - {}", e, text),
        }
    }

    /// Open a socket using the cached (or freshly looked up) URL.
    async fn open(&mut self) {
        if self.socket.is_some() {
            return;
        }

        let Some(url) = self.endpoint_url().await else {
            self.publish_state();
            return;
        };

        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                info!("Connected to event socket at {}", url);
                self.socket = Some(socket);
                self.state.on_open();
                self.publish_state();
                self.send_subscriptions().await;
            }
            Err(e) => {
                warn!("{}", WsError::ConnectionFailed(e.to_string()));
                self.schedule_reconnect();
            }
        }
    }

    async fn endpoint_url(&mut self) -> Option<String> {
        if let Some(url) = &self.cached_url {
            return Some(url.clone());
        }

        match self.resolver.resolve().await {
            Ok(info) if info.is_usable() => {
                self.cached_url = Some(info.url.clone());
                Some(info.url)
            }
            Ok(_) => {
                warn!("Event socket disabled by server configuration");
                None
            }
            Err(e) => {
                warn!("Event socket endpoint unavailable: {}", e);
                None
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        match self.state.on_close() {
            ReconnectDecision::Retry { attempt, delay } => {
                info!(
                    "Scheduling reconnection attempt {} of {} in {}ms",
                    attempt,
                    self.state.policy().max_attempts,
                    delay.as_millis()
                );
                self.timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            ReconnectDecision::GiveUp => {
                self.timer = None;
                error!(
                    "Failed to reconnect after {} attempts, giving up",
                    self.state.policy().max_attempts
                );
            }
        }
        self.publish_state();
    }

    async fn send_subscriptions(&mut self) {
        let Some(message) = self.state.subscribe_message() else {
            return;
        };
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match serde_json::to_string(&message) {
            Ok(json) => {
                debug!("Subscribing: {}", json);
                if let Err(e) = socket.send(Message::Text(json)).await {
                    warn!("{}", WsError::SendFailed(e.to_string()));
                }
            }
            Err(e) => error!("Failed to serialize subscribe message: {}", e),
        }
    }

    /// Clear the timer first, then close the socket.
    async fn teardown(&mut self) {
        self.timer = None;
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        self.state.on_teardown();
        self.publish_state();
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(socket) => socket.next().await,
        None => pending().await,
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockEndpointResolver;
    use crate::error::EndpointError;
    use std::time::Duration;

    fn test_config() -> DashwireConfig {
        DashwireConfig::default()
            .with_backoff(Duration::from_millis(5), Duration::from_millis(20))
    }

    #[test]
    fn test_ws_error_display() {
        assert_eq!(
            WsError::ConnectionFailed("timeout".to_string()).to_string(),
            "Connection failed: timeout"
        );
        assert_eq!(WsError::Disconnected.to_string(), "Disconnected from server");
        assert_eq!(
            WsError::SendFailed("channel closed".to_string()).to_string(),
            "Send failed: channel closed"
        );
        assert_eq!(
            WsError::ParseError("invalid json".to_string()).to_string(),
            "Parse error: invalid json"
        );
    }

    #[test]
    fn test_receive_time_is_wall_clock_millis() {
        let before = chrono::Utc::now().timestamp_millis();
        let now = now_ms();
        let after = chrono::Utc::now().timestamp_millis();
        assert!(before <= now && now <= after);
        // Well past 2020-01-01, so millis rather than seconds
        assert!(now > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn test_disabled_endpoint_never_connects() {
        let resolver = MockEndpointResolver::disabled();
        let conn = StreamConnection::new(Arc::new(resolver.clone()), &test_config());

        conn.connect();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!conn.is_connected());
        assert_eq!(resolver.calls(), 1);
        let state = conn.state();
        assert_eq!(state.reconnect_attempts, 0);
        assert_eq!(state.pending_reconnect, None);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let resolver = MockEndpointResolver::failing(EndpointError::HttpStatus { status: 500 });
        let conn = StreamConnection::new(Arc::new(resolver.clone()), &test_config());

        conn.connect();
        conn.connect();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!conn.is_connected());
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_noop() {
        let conn = StreamConnection::new(
            Arc::new(MockEndpointResolver::disabled()),
            &test_config(),
        );
        conn.send(&serde_json::json!({"type": "ping"}));
        conn.subscribe_to_topics(["run-1"]);

        let mut rx = conn.state_receiver();
        let state = rx
            .wait_for(|s| !s.subscribed_topics.is_empty())
            .await
            .unwrap()
            .clone();
        assert_eq!(state.subscribed_topics, vec!["run-1".to_string()]);
        assert!(!state.is_connected);
        assert!(conn.last_message().is_none());
    }
}
