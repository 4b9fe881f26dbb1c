//! Pluggable reconnection policy for a failed/refused outbound connect (§4.D, §9, §10.E).

use std::time::Duration;

/// Strategy deciding whether and when to retry an outbound connect.
pub trait ReconnectionPolicy: std::fmt::Debug {
    /// Total number of attempts this policy allows, including the first.
    fn attempts(&self) -> u32;

    /// Delay before attempt number `attempt` (1-based, `attempt >= 2`).
    fn timeout_after(&self, attempt: u32) -> Duration;

    /// Whether to give up after `attempt` failed attempts.
    fn give_up(&self, attempt: u32) -> bool {
        attempt >= self.attempts()
    }
}

/// Never reconnects (mirrors `without_reconnection.hpp`).
#[derive(Debug, Default)]
pub struct NullReconnectionPolicy;

impl ReconnectionPolicy for NullReconnectionPolicy {
    fn attempts(&self) -> u32 {
        0
    }

    fn timeout_after(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }

    fn give_up(&self, _attempt: u32) -> bool {
        true
    }
}

/// Fixed attempt cap with a timeout that doubles per attempt, capped at a
/// maximum (mirrors `timeout_reconnection.hpp`). Matches §6's
/// `reconnect_attempts`/`reconnect_timeout` configuration fields.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutReconnectionPolicy {
    attempts: u32,
    base_timeout: Duration,
    max_timeout: Duration,
}

impl TimeoutReconnectionPolicy {
    pub fn new(attempts: u32, base_timeout: Duration) -> Self {
        TimeoutReconnectionPolicy {
            attempts,
            base_timeout,
            max_timeout: base_timeout * (1 << attempts.min(16)),
        }
    }

    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }
}

impl ReconnectionPolicy for TimeoutReconnectionPolicy {
    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn timeout_after(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        let scaled = self.base_timeout * (1u32 << doublings);
        scaled.min(self.max_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_policy_never_reconnects() {
        let p = NullReconnectionPolicy;
        assert!(p.give_up(1));
    }

    #[test]
    fn timeout_policy_doubles_per_attempt() {
        let p = TimeoutReconnectionPolicy::new(5, Duration::from_secs(5));
        assert_eq!(p.timeout_after(1), Duration::from_secs(5));
        assert_eq!(p.timeout_after(2), Duration::from_secs(10));
        assert_eq!(p.timeout_after(3), Duration::from_secs(20));
    }

    #[test]
    fn timeout_policy_gives_up_after_configured_attempts() {
        let p = TimeoutReconnectionPolicy::new(3, Duration::from_secs(1));
        assert!(!p.give_up(2));
        assert!(p.give_up(3));
    }
}
