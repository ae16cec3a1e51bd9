//! Scenario stream reader.
//!
//! [`SseReader`] POSTs a scenario request, reads the `text/event-stream`
//! body on a spawned task and publishes the evolving [`StreamSession`]
//! through a `watch` channel. Starting a new stream or resetting aborts
//! the previous task first; every session write is keyed by session id so
//! an aborted loop can never touch a newer session.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::parser::{consume_chunk, ParserState};
use super::session::{Flow, ResultDefaults, SessionStatus, StreamSession, TerminalResult};
use crate::config::DashwireConfig;
use crate::error::StreamError;

/// Body of the scenario stream request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    pub fail_fast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
}

impl StreamRequest {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            ..Self::default()
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_link_id(mut self, link_id: impl Into<String>) -> Self {
        self.link_id = Some(link_id.into());
        self
    }

    fn defaults(&self) -> ResultDefaults {
        ResultDefaults {
            scenario: self.scenario.clone(),
            preset: self.preset.clone(),
        }
    }
}

/// Invoked at most once, when a session completes.
pub type CompletionCallback = Box<dyn FnOnce(&TerminalResult) + Send + 'static>;

/// Reads one scenario stream at a time.
pub struct SseReader {
    client: Client,
    url: String,
    state_tx: Arc<watch::Sender<StreamSession>>,
    task: Option<JoinHandle<()>>,
}

impl SseReader {
    pub fn new(config: &DashwireConfig) -> Self {
        let (state_tx, _) = watch::channel(StreamSession::idle());
        Self {
            client: Client::new(),
            url: config.stream_url(),
            state_tx: Arc::new(state_tx),
            task: None,
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, ...).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start streaming `request`, discarding whatever session came before.
    ///
    /// Returns the id of the new session.
    pub fn start_stream(
        &mut self,
        request: StreamRequest,
        on_complete: Option<CompletionCallback>,
    ) -> Uuid {
        self.abort();

        let session_id = Uuid::new_v4();
        self.state_tx.send_replace(StreamSession::started(session_id));
        info!(
            "Starting scenario stream '{}' (session {})",
            request.scenario, session_id
        );

        let task = tokio::spawn(run_session(
            self.client.clone(),
            self.url.clone(),
            request,
            session_id,
            Arc::clone(&self.state_tx),
            on_complete,
        ));
        self.task = Some(task);
        session_id
    }

    /// Abort any in-flight stream and return to `idle`.
    pub fn reset(&mut self) {
        self.abort();
        self.state_tx.send_replace(StreamSession::idle());
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> StreamSession {
        self.state_tx.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state_tx.borrow().status
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<StreamSession> {
        self.state_tx.subscribe()
    }

    /// Wait until the current session stops streaming and return it.
    pub async fn wait_for_terminal(&self) -> StreamSession {
        let mut rx = self.state_tx.subscribe();
        let session = match rx.wait_for(|s| s.status != SessionStatus::Streaming).await {
            Ok(session) => session.clone(),
            Err(_) => self.session(),
        };
        session
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("Aborting in-flight scenario stream");
            }
            task.abort();
        }
    }
}

impl Drop for SseReader {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn run_session(
    client: Client,
    url: String,
    request: StreamRequest,
    session_id: Uuid,
    state: Arc<watch::Sender<StreamSession>>,
    on_complete: Option<CompletionCallback>,
) {
    let defaults = request.defaults();

    let response = match client
        .post(&url)
        .header(ACCEPT, "text/event-stream")
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            fail(
                &state,
                session_id,
                StreamError::Request {
                    message: e.to_string(),
                },
            );
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match body.trim() {
            "" => status.canonical_reason().unwrap_or("Unknown error").to_string(),
            text => text.to_string(),
        };
        fail(
            &state,
            session_id,
            StreamError::Status {
                status: status.as_u16(),
                message,
            },
        );
        return;
    }

    if response.content_length() == Some(0) {
        fail(&state, session_id, StreamError::MissingBody);
        return;
    }

    read_body(
        response.bytes_stream(),
        session_id,
        &state,
        &defaults,
        on_complete,
    )
    .await;
}

/// Drive the parser and session over a body stream until a terminal
/// event, a transport error, or the end of the stream.
async fn read_body<S, E>(
    body: S,
    session_id: Uuid,
    state: &watch::Sender<StreamSession>,
    defaults: &ResultDefaults,
    mut on_complete: Option<CompletionCallback>,
) where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    futures_util::pin_mut!(body);
    let mut parser = ParserState::new();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                fail(
                    state,
                    session_id,
                    StreamError::Transport {
                        message: e.to_string(),
                    },
                );
                return;
            }
        };

        let (next, events) = consume_chunk(parser, &bytes);
        parser = next;

        for event in events {
            debug!("SSE event: {}", event.event_type_name());
            match update(state, session_id, |session| session.apply(&event, defaults)) {
                None => {
                    debug!("Session {} superseded, stopping read", session_id);
                    return;
                }
                Some(Flow::Continue) => {}
                Some(Flow::Failed) => {
                    error!("Scenario stream reported an error");
                    return;
                }
                Some(Flow::Completed(result)) => {
                    info!(
                        "Scenario '{}' completed (success: {})",
                        result.scenario, result.success
                    );
                    if let Some(callback) = on_complete.take() {
                        callback(&result);
                    }
                    return;
                }
            }
        }
    }

    let leftover = parser.finish();
    if !leftover.trim().is_empty() {
        debug!("Discarding {} bytes of unterminated SSE data", leftover.len());
    }
    fail(state, session_id, StreamError::EndedBeforeCompletion);
}

/// Mutate the session only if it is still `session_id`.
fn update<R>(
    state: &watch::Sender<StreamSession>,
    session_id: Uuid,
    f: impl FnOnce(&mut StreamSession) -> R,
) -> Option<R> {
    let mut f = Some(f);
    let mut out = None;
    state.send_if_modified(|session| {
        if session.session_id != session_id {
            return false;
        }
        out = f.take().map(|f| f(session));
        out.is_some()
    });
    out
}

fn fail(state: &watch::Sender<StreamSession>, session_id: Uuid, err: StreamError) {
    warn!(
        "Scenario stream failed [{}] (retryable: {}): {}",
        err.error_code(),
        err.is_retryable(),
        err
    );
    update(state, session_id, |session| session.fail(&err));
}
