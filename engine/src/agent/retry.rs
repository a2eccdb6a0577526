//! Exponential-backoff retry for transient agent failures.
//!
//! Defaults and the transient-pattern list are taken from the original's
//! `claude_ai/client.py` (`ClaudeAIConfig`, `_TRANSIENT_PATTERNS`).

use std::time::Duration;

const TRANSIENT_PATTERNS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "overloaded",
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "temporarily unavailable",
    "service unavailable",
    "503",
    "502",
    "504",
    "internal server error",
    "500",
];

/// True if `message` looks like a transient failure worth retrying.
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs_f64(1.0),
            max_delay: Duration::from_secs_f64(30.0),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`-th retry (1-based), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_transient_patterns_case_insensitively() {
        assert!(is_transient("Rate limit exceeded, try again"));
        assert!(is_transient("HTTP 503 Service Unavailable"));
        assert!(is_transient("Connection Reset by peer"));
    }

    #[test]
    fn non_transient_messages_are_not_retried() {
        assert!(!is_transient("invalid schema: missing field 'action'"));
        assert!(!is_transient("permission denied"));
    }

    #[test]
    fn delay_grows_exponentially_then_caps() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_secs_f64(1.0));
        assert_eq!(cfg.delay_for_attempt(2), Duration::from_secs_f64(2.0));
        assert_eq!(cfg.delay_for_attempt(3), Duration::from_secs_f64(4.0));
        assert_eq!(cfg.delay_for_attempt(10), Duration::from_secs_f64(30.0));
    }
}
