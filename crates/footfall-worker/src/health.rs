//! Stream health state machine.
//!
//! `Connecting -> Active -> Stale -> Reconnecting -> (Active | Failed)`.
//! The machine is pure: the supervisor feeds it observations (frames,
//! failures, health-check ticks, refreshes) and acts on what it returns.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use footfall_models::{StreamHealth, StreamState};

use crate::backoff::ReconnectPolicy;

/// What the supervisor should do after a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDirective {
    /// Reopen the stream after the delay
    RetryAfter(Duration),
    /// Attempts exhausted or the error cannot heal; wait for a refresh
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct HealthMachine {
    policy: ReconnectPolicy,
    stale_threshold: Duration,
    health: StreamHealth,
    last_frame: Option<Instant>,
}

impl HealthMachine {
    pub fn new(policy: ReconnectPolicy, stale_threshold: Duration) -> Self {
        Self {
            policy,
            stale_threshold,
            health: StreamHealth::new(),
            last_frame: None,
        }
    }

    pub fn health(&self) -> &StreamHealth {
        &self.health
    }

    pub fn state(&self) -> StreamState {
        self.health.state
    }

    pub fn generation(&self) -> u64 {
        self.health.generation
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// A frame arrived. Returns the previous state if this was a transition.
    pub fn on_frame(&mut self, now: Instant) -> Option<StreamState> {
        self.last_frame = Some(now);
        self.health.last_frame_at = Some(Utc::now());
        self.health.consecutive_failures = 0;
        self.health.attempt = 0;
        self.health.next_delay_ms = None;
        self.health.last_error = None;
        self.set_state(StreamState::Active)
    }

    /// Periodic staleness check.
    ///
    /// Returns true when an active stream has gone quiet for longer than
    /// the threshold; the state is then `Stale`.
    pub fn on_health_check(&mut self, now: Instant) -> bool {
        if self.health.state != StreamState::Active {
            return false;
        }
        let Some(last) = self.last_frame else {
            return false;
        };
        if now.saturating_duration_since(last) <= self.stale_threshold {
            return false;
        }

        self.set_state(StreamState::Stale);
        true
    }

    /// Idle time since the last frame.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.last_frame.map(|last| now.saturating_duration_since(last))
    }

    /// Leave `Stale` for `Reconnecting`; the reopen happens immediately and
    /// does not consume an attempt.
    pub fn begin_reconnect(&mut self) {
        self.set_state(StreamState::Reconnecting);
    }

    /// The stream failed to open or broke.
    pub fn on_failure(&mut self, error: impl Into<String>, retryable: bool) -> FailureDirective {
        self.health.consecutive_failures += 1;
        self.health.last_error = Some(error.into());

        if self.health.state == StreamState::Failed {
            return FailureDirective::GiveUp;
        }

        if !retryable {
            self.health.next_delay_ms = None;
            self.set_state(StreamState::Failed);
            return FailureDirective::GiveUp;
        }

        self.health.attempt += 1;
        match self.policy.delay_for(self.health.attempt) {
            Some(delay) => {
                self.health.next_delay_ms = Some(delay.as_millis() as u64);
                self.set_state(StreamState::Reconnecting);
                FailureDirective::RetryAfter(delay)
            }
            None => {
                self.health.next_delay_ms = None;
                self.set_state(StreamState::Failed);
                FailureDirective::GiveUp
            }
        }
    }

    /// Explicit refresh: new generation, attempts reset, back to `Connecting`.
    pub fn refresh(&mut self) -> u64 {
        self.health.generation += 1;
        self.health.attempt = 0;
        self.health.consecutive_failures = 0;
        self.health.next_delay_ms = None;
        self.health.last_error = None;
        self.last_frame = None;
        self.set_state(StreamState::Connecting);
        self.health.generation
    }

    fn set_state(&mut self, next: StreamState) -> Option<StreamState> {
        let previous = self.health.state;
        if previous == next {
            return None;
        }
        self.health.state = next;
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> HealthMachine {
        HealthMachine::new(ReconnectPolicy::default(), Duration::from_secs(30))
    }

    #[test]
    fn test_first_frame_activates() {
        let mut m = machine();
        assert_eq!(m.state(), StreamState::Connecting);
        assert_eq!(m.on_frame(Instant::now()), Some(StreamState::Connecting));
        assert_eq!(m.state(), StreamState::Active);
        assert_eq!(m.on_frame(Instant::now()), None);
    }

    #[test]
    fn test_stale_after_threshold() {
        let mut m = machine();
        let start = Instant::now();
        m.on_frame(start);

        assert!(!m.on_health_check(start + Duration::from_secs(15)));
        assert!(!m.on_health_check(start + Duration::from_secs(30)));
        assert!(m.on_health_check(start + Duration::from_secs(31)));
        assert_eq!(m.state(), StreamState::Stale);

        m.begin_reconnect();
        assert_eq!(m.state(), StreamState::Reconnecting);
        assert_eq!(m.health().attempt, 0);
    }

    #[test]
    fn test_backoff_until_failed() {
        let mut m = machine();
        let mut delays = Vec::new();
        loop {
            match m.on_failure("connection refused", true) {
                FailureDirective::RetryAfter(d) => delays.push(d.as_millis() as u64),
                FailureDirective::GiveUp => break,
            }
        }

        assert_eq!(delays, vec![2000, 3000, 4500, 6750, 10125]);
        assert_eq!(m.state(), StreamState::Failed);
        assert_eq!(m.health().attempt, 6);
        assert_eq!(m.on_failure("still down", true), FailureDirective::GiveUp);
    }

    #[test]
    fn test_frame_resets_attempts() {
        let mut m = machine();
        m.on_failure("timeout", true);
        m.on_failure("timeout", true);
        assert_eq!(m.health().attempt, 2);

        m.on_frame(Instant::now());
        assert_eq!(m.state(), StreamState::Active);
        assert_eq!(m.health().attempt, 0);
        assert_eq!(m.health().consecutive_failures, 0);
        assert!(m.health().next_delay_ms.is_none());
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let mut m = machine();
        assert_eq!(m.on_failure("unsupported scheme", false), FailureDirective::GiveUp);
        assert_eq!(m.state(), StreamState::Failed);
    }

    #[test]
    fn test_refresh_recovers_from_failed() {
        let mut m = machine();
        while m.on_failure("down", true) != FailureDirective::GiveUp {}
        let generation = m.refresh();

        assert_eq!(generation, 1);
        assert_eq!(m.state(), StreamState::Connecting);
        assert_eq!(m.health().attempt, 0);
        assert_eq!(m.on_failure("down", true), FailureDirective::RetryAfter(Duration::from_secs(2)));
    }
}
