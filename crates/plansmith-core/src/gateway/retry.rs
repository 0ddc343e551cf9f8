//! Bounded retry with jittered exponential backoff.

use std::time::Duration;

use rand::Rng;

use crate::error::{ErrorKind, GatewayError};

/// Retry/backoff configuration (defaults: 3 attempts, 300ms base, 5s cap,
/// server `Retry-After` honoured up to 2 minutes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Ceiling for a server-requested `Retry-After`. Kept separate from
    /// `max_backoff` so throttling hints are not cut short.
    pub max_retry_after: Duration,
    /// Also retry `Conflict` failures. Off unless the caller opts in.
    pub retry_conflict: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(5),
            max_retry_after: Duration::from_secs(120),
            retry_conflict: false,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// A policy that retries without sleeping. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            max_retry_after: Duration::ZERO,
            retry_conflict: false,
        }
    }

    /// Whether `err`, seen on attempt `attempt` (1-indexed), warrants another try.
    pub fn should_retry(&self, err: &GatewayError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match err.kind() {
            Some(kind) if kind.is_retryable() => true,
            Some(ErrorKind::Conflict) => self.retry_conflict,
            _ => false,
        }
    }

    /// Delay before the attempt following `attempt` (1-indexed).
    ///
    /// A server-provided `Retry-After` wins over the computed backoff, capped
    /// at `max_retry_after`.
    pub fn delay_for(&self, err: &GatewayError, attempt: u32) -> Duration {
        match err.retry_after() {
            Some(requested) => requested.min(self.max_retry_after),
            None => self.backoff_delay(attempt),
        }
    }

    /// Jittered exponential backoff for the given attempt (1-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = self.base_backoff.saturating_mul(2u32.saturating_pow(exp));
        let capped = base.min(self.max_backoff);
        if capped.is_zero() {
            return Duration::ZERO;
        }
        let jitter: f64 = rand::rng().random_range(0.5..1.5);
        let seconds = (capped.as_secs_f64() * jitter).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteFault;

    fn err(kind: ErrorKind) -> GatewayError {
        GatewayError::remote(kind, "boom")
    }

    #[test]
    fn retries_transient_until_bound() {
        let policy = RetryPolicy::default();
        let transient = err(ErrorKind::Transient);
        assert!(policy.should_retry(&transient, 1));
        assert!(policy.should_retry(&transient, 2));
        assert!(!policy.should_retry(&transient, 3));
    }

    #[test]
    fn never_retries_terminal_kinds() {
        let policy = RetryPolicy::default();
        for kind in [
            ErrorKind::Unauthorized,
            ErrorKind::Fatal,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
        ] {
            assert!(!policy.should_retry(&err(kind), 1), "{kind} must not retry");
        }
        assert!(!policy.should_retry(&GatewayError::Cancelled, 1));
    }

    #[test]
    fn conflict_retry_is_opt_in() {
        let policy = RetryPolicy {
            retry_conflict: true,
            ..Default::default()
        };
        assert!(policy.should_retry(&err(ErrorKind::Conflict), 1));
    }

    #[test]
    fn disabled_policy_never_retries() {
        assert!(!RetryPolicy::disabled().should_retry(&err(ErrorKind::Transient), 1));
    }

    #[test]
    fn backoff_grows_and_stays_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            ..Default::default()
        };
        let first = policy.backoff_delay(1);
        assert!(first >= Duration::from_millis(50) && first <= Duration::from_millis(150));
        for attempt in 1..12 {
            assert!(policy.backoff_delay(attempt) <= Duration::from_secs(1));
        }
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        let limited = GatewayError::Remote(
            RemoteFault::new(ErrorKind::RateLimited, "slow down")
                .with_retry_after(Duration::from_secs(2)),
        );
        assert_eq!(policy.delay_for(&limited, 1), Duration::from_secs(2));

        let beyond_backoff_cap = GatewayError::Remote(
            RemoteFault::new(ErrorKind::RateLimited, "slow down")
                .with_retry_after(Duration::from_secs(30)),
        );
        assert!(policy.max_backoff < Duration::from_secs(30));
        assert_eq!(policy.delay_for(&beyond_backoff_cap, 1), Duration::from_secs(30));

        let huge = GatewayError::Remote(
            RemoteFault::new(ErrorKind::RateLimited, "slow down")
                .with_retry_after(Duration::from_secs(600)),
        );
        assert_eq!(policy.delay_for(&huge, 1), policy.max_retry_after);
    }

    #[test]
    fn immediate_policy_has_no_delay() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff_delay(2), Duration::ZERO);
    }
}
