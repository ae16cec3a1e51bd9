//! Connection state and reconnection backoff.
//!
//! [`ConnectionState`] holds everything the socket actor mutates in
//! response to open/message/close events. It has no I/O of its own, so
//! the backoff rules can be driven directly in tests.

use std::time::Duration;

use super::client::WsError;
use super::messages::{RawEvent, WsOutgoingMessage};
use super::normalize::{normalize, Event};

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based): `min(initial * 2^(n-1), max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// What to do after the socket went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule attempt number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Attempt budget exhausted; stay down until a manual reconnect.
    GiveUp,
}

/// Observable state of one logical socket connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub last_message: Option<Event>,
    /// Reconnect attempts scheduled since the last successful open
    pub reconnect_attempts: u32,
    /// Delay the next scheduled attempt will use
    pub reconnect_delay: Duration,
    pub subscribed_topics: Vec<String>,
    /// Delay of the currently pending reconnect timer, if any
    pub pending_reconnect: Option<Duration>,
    /// Set once the attempt budget ran out
    pub exhausted: bool,
    policy: ReconnectPolicy,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

impl ConnectionState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            is_connected: false,
            last_message: None,
            reconnect_attempts: 0,
            reconnect_delay: policy.initial_delay,
            subscribed_topics: Vec::new(),
            pending_reconnect: None,
            exhausted: false,
            policy,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Socket opened successfully.
    pub fn on_open(&mut self) {
        self.is_connected = true;
        self.reset_backoff();
    }

    /// Socket closed or failed to open.
    ///
    /// A close that arrives while a timer is pending replaces that timer
    /// (the caller drops the old one); it never adds a second.
    pub fn on_close(&mut self) -> ReconnectDecision {
        self.is_connected = false;

        if self.reconnect_attempts >= self.policy.max_attempts {
            self.pending_reconnect = None;
            self.exhausted = true;
            return ReconnectDecision::GiveUp;
        }

        self.reconnect_attempts += 1;
        let delay = self.policy.delay_for_attempt(self.reconnect_attempts);
        self.reconnect_delay = self.policy.delay_for_attempt(self.reconnect_attempts + 1);
        self.pending_reconnect = Some(delay);

        ReconnectDecision::Retry {
            attempt: self.reconnect_attempts,
            delay,
        }
    }

    /// Pending reconnect timer elapsed.
    pub fn on_timer_fired(&mut self) {
        self.pending_reconnect = None;
    }

    /// Explicit teardown: socket closed on purpose, timer cleared.
    pub fn on_teardown(&mut self) {
        self.is_connected = false;
        self.pending_reconnect = None;
    }

    /// Parse and normalize one inbound text frame.
    pub fn on_message(&mut self, text: &str, received_at_ms: i64) -> Result<Event, WsError> {
        let raw = RawEvent::parse(text)?;
        let event = normalize(raw, received_at_ms);
        self.last_message = Some(event.clone());
        Ok(event)
    }

    pub fn reset_backoff(&mut self) {
        self.reconnect_attempts = 0;
        self.reconnect_delay = self.policy.initial_delay;
        self.pending_reconnect = None;
        self.exhausted = false;
    }

    /// Replace the tracked topic set.
    pub fn set_topics(&mut self, topics: Vec<String>) {
        self.subscribed_topics = topics;
    }

    /// Control frame replaying the tracked topics, if there are any.
    pub fn subscribe_message(&self) -> Option<WsOutgoingMessage> {
        if self.subscribed_topics.is_empty() {
            return None;
        }
        Some(WsOutgoingMessage::Subscribe {
            run_ids: self.subscribed_topics.clone(),
        })
    }
}
