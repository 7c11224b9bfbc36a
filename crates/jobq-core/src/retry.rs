//! Retry and backoff policy.
//!
//! Pure functions: the worker feeds in an attempt count and gets back a
//! deterministic eligibility time or an exhaustion verdict. No store
//! access, no clock access.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::{Error, Result};

/// Delays are clamped here before conversion; `powi` saturates to
/// infinity for large attempt counts.
const MAX_DELAY_SECS: f64 = 86_400.0 * 365.0 * 100.0;

/// Exponential backoff: after its `attempts`-th failure a job becomes
/// eligible again `base^attempts` seconds later, optionally clamped to a
/// configured ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    base: f64,
    max_backoff: Option<Duration>,
}

impl RetryPolicy {
    pub const DEFAULT_BASE: f64 = 2.0;

    pub fn new(base: f64, max_backoff: Option<Duration>) -> Result<Self> {
        if !base.is_finite() || base <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "backoff base must be a positive number, got {base}"
            )));
        }
        Ok(Self { base, max_backoff })
    }

    /// How long after the `attempts`-th failure the job stays ineligible.
    /// `attempts` is the post-increment count, so the first failure of a
    /// base-2 policy waits `2^1 = 2` seconds.
    pub fn delay(&self, attempts: u32) -> Duration {
        let mut secs = self.base.powi(attempts as i32).min(MAX_DELAY_SECS);
        if let Some(cap) = self.max_backoff {
            secs = secs.min(cap.as_secs_f64());
        }
        Duration::from_secs_f64(secs)
    }

    /// Timestamp at which the job becomes claimable again.
    pub fn next_eligible(&self, now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
        let delay = TimeDelta::from_std(self.delay(attempts)).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Self::DEFAULT_BASE,
            max_backoff: None,
        }
    }
}

/// A job is out of retries once its attempt count reaches the ceiling.
pub fn is_exhausted(attempts: u32, max_retries: u32) -> bool {
    attempts >= max_retries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_next_eligible_offsets_from_now() {
        let policy = RetryPolicy::default();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert_eq!(policy.next_eligible(now, 1) - now, TimeDelta::seconds(2));
        assert_eq!(policy.next_eligible(now, 3) - now, TimeDelta::seconds(8));
        assert_eq!(policy.next_eligible(now, 0) - now, TimeDelta::seconds(1));
    }

    #[test]
    fn test_non_integer_base() {
        let policy = RetryPolicy::new(1.5, None).unwrap();
        assert_eq!(policy.delay(2), Duration::from_secs_f64(2.25));
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(RetryPolicy::new(0.0, None).is_err());
        assert!(RetryPolicy::new(-2.0, None).is_err());
        assert!(RetryPolicy::new(f64::NAN, None).is_err());
        assert!(RetryPolicy::new(f64::INFINITY, None).is_err());
    }

    #[test]
    fn test_max_backoff_clamps_delay() {
        let policy = RetryPolicy::new(2.0, Some(Duration::from_secs(60))).unwrap();
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(10), Duration::from_secs(60));
    }

    #[test]
    fn test_uncapped_delay_does_not_panic_on_huge_attempts() {
        let policy = RetryPolicy::default();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let eligible = policy.next_eligible(now, u32::MAX);
        assert!(eligible > now);
    }

    #[test]
    fn test_is_exhausted_boundary() {
        assert!(is_exhausted(3, 3));
        assert!(is_exhausted(4, 3));
        assert!(!is_exhausted(2, 3));
        assert!(!is_exhausted(0, 1));
    }
}
