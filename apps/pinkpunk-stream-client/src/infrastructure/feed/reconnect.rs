//! Reconnection Policy
//!
//! Linear backoff for recycling the feed connection after an abnormal
//! close. The policy is consulted only for transport closes, transport
//! errors, and heartbeat timeouts - never after a manual disconnect.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay multiplied by the attempt number.
    pub base_delay: Duration,
    /// Attempts allowed before the policy reports exhaustion.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &crate::WebSocketSettings) -> Self {
        Self {
            base_delay: settings.reconnect_base_delay,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Reconnection policy implementing linear backoff.
///
/// Attempt `n` (1-based) waits `base_delay * n`. Once `max_attempts` have
/// been handed out the policy reports exhaustion by returning `None` until
/// it is reset by a successful open.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Get the delay before the next attempt, or `None` when exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt_count >= self.config.max_attempts {
            return None;
        }
        self.attempt_count += 1;
        Some(self.config.base_delay * self.attempt_count)
    }

    /// Reset the counter after a successful open.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Attempts handed out since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Check whether another attempt is available.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig::default())
    }

    #[test_case(1, 3000; "first attempt")]
    #[test_case(2, 6000; "second attempt")]
    #[test_case(3, 9000; "third attempt")]
    #[test_case(4, 12000; "fourth attempt")]
    #[test_case(5, 15000; "fifth attempt")]
    fn delay_grows_linearly(attempt: u32, expected_ms: u64) {
        let mut policy = policy();
        let mut delay = None;
        for _ in 0..attempt {
            delay = policy.next_delay();
        }
        assert_eq!(delay, Some(Duration::from_millis(expected_ms)));
    }

    #[test]
    fn sixth_attempt_is_exhaustion() {
        let mut policy = policy();
        for _ in 0..5 {
            assert!(policy.next_delay().is_some());
        }
        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
        assert_eq!(policy.attempt_count(), 5);
    }

    #[test]
    fn exhaustion_is_sticky_until_reset() {
        let mut policy = policy();
        while policy.next_delay().is_some() {}
        assert!(policy.next_delay().is_none());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn reset_restarts_the_ladder() {
        let mut policy = policy();
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.should_retry());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(3000)));
    }

    #[test]
    fn custom_config() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::new(Duration::from_millis(10), 2));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(20)));
        assert_eq!(policy.next_delay(), None);
    }
}
