//! Session and liveness tracking.
//!
//! A session is the logical pairing of one client and one server over a
//! pair of channels. Each endpoint owns its own [`Session`] instance; there
//! is no shared state across the process boundary beyond the messages
//! themselves. Liveness is purely observational: a peer is considered
//! unresponsive when no message has arrived within the configured timeout.

use std::time::{Duration, Instant};

/// Link liveness as seen from one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Messages arriving within the liveness window
    Connected,
    /// No message within the liveness window
    LinkLost,
}

/// Logical client/server pairing with per-direction liveness state.
///
/// Created on the first successfully decoded message in either direction.
#[derive(Debug, Clone)]
pub struct Session {
    pub client_id: String,
    pub established_at: Instant,
    last_seen_command: Option<Instant>,
    last_seen_observation: Option<Instant>,
}

impl Session {
    pub fn new(client_id: impl Into<String>, now: Instant) -> Self {
        Self {
            client_id: client_id.into(),
            established_at: now,
            last_seen_command: None,
            last_seen_observation: None,
        }
    }

    /// Record a decoded command arrival
    pub fn saw_command(&mut self, now: Instant) {
        self.last_seen_command = Some(now);
    }

    /// Record a decoded observation arrival
    pub fn saw_observation(&mut self, now: Instant) {
        self.last_seen_observation = Some(now);
    }

    /// No command within `timeout`. A session that has never seen a command
    /// measures from its establishment time.
    pub fn command_stale(&self, timeout: Duration, now: Instant) -> bool {
        let reference = self.last_seen_command.unwrap_or(self.established_at);
        now.duration_since(reference) > timeout
    }

    /// No observation within `timeout`
    pub fn observation_stale(&self, timeout: Duration, now: Instant) -> bool {
        let reference = self.last_seen_observation.unwrap_or(self.established_at);
        now.duration_since(reference) > timeout
    }
}

/// Outcome of observing one received sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Exactly the successor of the previous sequence number
    InOrder,
    /// Skipped `n` messages since the last one seen
    Gap(u64),
    /// At or behind the last seen sequence number (reorder or replay)
    Stale,
}

/// Detects loss and reordering from per-session monotonic sequence ids.
///
/// Detection only: the caller logs the result and processes the message
/// either way. Stale messages are the one exception; conflating consumers
/// skip them since a newer sample has already been handled.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `seq` against the last observed value and advance
    pub fn observe(&mut self, seq: u64) -> SequenceCheck {
        let check = match self.last {
            None => SequenceCheck::InOrder,
            Some(last) if seq == last + 1 => SequenceCheck::InOrder,
            Some(last) if seq > last + 1 => SequenceCheck::Gap(seq - last - 1),
            Some(_) => SequenceCheck::Stale,
        };
        if !matches!(check, SequenceCheck::Stale) {
            self.last = Some(seq);
        }
        check
    }

    /// Reset on session teardown
    pub fn reset(&mut self) {
        self.last = None;
    }
}
