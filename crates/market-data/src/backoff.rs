//! Exponential backoff policy for rate-limit retries.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default base delay for the first retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Default ceiling for the retry delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Exponential backoff with a ceiling.
///
/// The delay for attempt `n` is `min(base * 2^n, max)`. When the
/// upstream supplies a quota reset time, the delay is shortened to
/// that deadline if it resolves sooner (never lengthened).
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Base delay, doubled per attempt.
    pub base: Duration,
    /// Maximum delay ceiling.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl BackoffPolicy {
    /// Compute the delay for the given attempt number:
    /// `min(base * 2^attempt, max)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        // Saturate the shift; the ceiling kicks in long before 2^31.
        let factor = 1u64 << attempt.min(31);
        let millis = (self.base.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis).min(self.max)
    }

    /// Shorten `delay` when the server-supplied reset time resolves
    /// sooner than the computed backoff.
    pub fn capped_by_reset(
        &self,
        delay: Duration,
        reset_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Duration {
        match (reset_at - now).to_std() {
            Ok(until_reset) if until_reset > Duration::ZERO && until_reset < delay => until_reset,
            _ => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = BackoffPolicy::default();

        assert_eq!(policy.delay(0), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(2), Duration::from_secs(8));
        assert_eq!(policy.delay(3), Duration::from_secs(16));
    }

    #[test]
    fn test_delay_is_capped_at_max() {
        let policy = BackoffPolicy::default();

        assert_eq!(policy.delay(5), Duration::from_secs(60));
        assert_eq!(policy.delay(10), Duration::from_secs(60));
        assert_eq!(policy.delay(100), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_is_non_decreasing() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(250),
            max: Duration::from_secs(30),
        };

        let mut previous = Duration::ZERO;
        for attempt in 0..64 {
            let delay = policy.delay(attempt);
            assert!(delay >= previous, "delay decreased at attempt {}", attempt);
            assert!(delay <= policy.max);
            previous = delay;
        }
    }

    #[test]
    fn test_reset_hint_shortens_the_wait() {
        let policy = BackoffPolicy::default();
        let now = Utc::now();

        // Computed delay 8s, quota resets in 3s: wait only until the reset.
        let reset_at = now + TimeDelta::seconds(3);
        let capped = policy.capped_by_reset(Duration::from_secs(8), reset_at, now);
        assert_eq!(capped, Duration::from_secs(3));
    }

    #[test]
    fn test_reset_hint_never_lengthens_the_wait() {
        let policy = BackoffPolicy::default();
        let now = Utc::now();

        let reset_at = now + TimeDelta::seconds(30);
        let capped = policy.capped_by_reset(Duration::from_secs(4), reset_at, now);
        assert_eq!(capped, Duration::from_secs(4));
    }

    #[test]
    fn test_reset_hint_in_the_past_is_ignored() {
        let policy = BackoffPolicy::default();
        let now = Utc::now();

        let reset_at = now - TimeDelta::seconds(5);
        let capped = policy.capped_by_reset(Duration::from_secs(4), reset_at, now);
        assert_eq!(capped, Duration::from_secs(4));
    }
}
