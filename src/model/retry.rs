//! Retry policy for backend calls
//!
//! Transient backend failures (rate limits, overload, 5xx, timeouts) are
//! retried with exponential backoff and jitter. Terminal failures (auth,
//! invalid request) are never retried. The adapter drives the loop; this
//! module owns the policy and the delay math.

use std::time::Duration;

/// Backoff policy for transient backend failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first call
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit bounds.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the retry following failed attempt `attempt` (0-based),
    /// with jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Jitter from the subsecond clock: 0-99ms, cheap and good enough
        // to de-synchronize concurrent turns.
        let jitter = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| (d.subsec_nanos() as u64) % 100)
            .unwrap_or(0);

        Duration::from_millis(compute_delay(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            jitter,
        ))
    }
}

/// Exponential backoff with saturation: `base * 2^attempt + jitter`, capped
/// at `max`. The shift is clamped so large attempt counts cannot overflow.
fn compute_delay(attempt: u32, base_ms: u64, max_ms: u64, jitter_ms: u64) -> u64 {
    base_ms
        .saturating_mul(1u64 << attempt.min(16))
        .saturating_add(jitter_ms)
        .min(max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_delay_exponential() {
        assert_eq!(compute_delay(0, 500, 30_000, 0), 500);
        assert_eq!(compute_delay(1, 500, 30_000, 0), 1_000);
        assert_eq!(compute_delay(2, 500, 30_000, 0), 2_000);
        assert_eq!(compute_delay(3, 500, 30_000, 0), 4_000);
    }

    #[test]
    fn test_compute_delay_caps_at_max() {
        assert_eq!(compute_delay(10, 500, 30_000, 0), 30_000);
        assert_eq!(compute_delay(6, 500, 30_000, 0), 30_000);
    }

    #[test]
    fn test_compute_delay_jitter_respects_cap() {
        assert_eq!(compute_delay(10, 500, 30_000, 99), 30_000);
        assert_eq!(compute_delay(0, 500, 30_000, 50), 550);
    }

    #[test]
    fn test_compute_delay_no_overflow_on_large_attempt() {
        // The shift clamps at 16, then saturating math takes over.
        let d = compute_delay(u32::MAX, u64::MAX / 2, u64::MAX, 0);
        assert_eq!(d, u64::MAX);
    }

    #[test]
    fn test_default_policy_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 500);
        assert_eq!(policy.max_delay_ms, 30_000);
    }

    #[test]
    fn test_delay_for_stays_within_cap() {
        let policy = RetryPolicy::new(5, 500, 30_000);
        for attempt in 0..20 {
            assert!(policy.delay_for(attempt) <= Duration::from_millis(30_000));
        }
    }
}
