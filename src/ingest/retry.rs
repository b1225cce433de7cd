// src/ingest/retry.rs
//
// Explicit retry state for source fetches: attempt counter plus computed
// delay, returning a typed result. Nothing is thrown past this boundary.

use std::time::Duration;

use metrics::counter;
use rand::Rng;

use crate::error::FetchError;
use crate::ingest::types::SourceStrategy;

/// Exponential backoff: `base_delay * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Total fetch attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after the 0-based `attempt` has failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// `delay_for_attempt` plus up to one `base_delay` of jitter, so a fleet
    /// of workers does not hammer a recovering source in lockstep. The sum
    /// is clamped to `max_delay` like the raw delay is.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let base_ms = self.base_delay.as_millis() as u64;
        if base_ms == 0 {
            return delay;
        }
        let jitter_ms = rand::rng().random_range(0..base_ms);
        (delay + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }
}

/// Drive a strategy's fetch through the retry policy. Retryable transport
/// failures burn attempts with backoff in between; non-retryable failures
/// stop immediately. The last error is returned once attempts run out.
pub async fn fetch_with_retry(
    strategy: &dyn SourceStrategy,
    client: &reqwest::Client,
    policy: &BackoffPolicy,
) -> Result<String, FetchError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err = FetchError::Other("no attempt made".to_string());

    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(policy.jittered_delay(attempt - 1)).await;
            counter!("scrape_fetch_retries_total").increment(1);
        }
        match strategy.fetch(client).await {
            Ok(body) => return Ok(body),
            Err(err) => {
                tracing::warn!(
                    source = strategy.source(),
                    attempt = attempt + 1,
                    error = %err,
                    "fetch attempt failed"
                );
                if !err.is_retryable() {
                    return Err(err);
                }
                last_err = err;
            }
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn delays_cap_at_max() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(63), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_one_base_delay() {
        let policy = BackoffPolicy::default();
        for _ in 0..50 {
            let d = policy.jittered_delay(0);
            assert!(d >= Duration::from_secs(1));
            assert!(d < Duration::from_secs(2));
        }
    }

    #[test]
    fn zero_base_delay_means_no_jitter() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        assert_eq!(policy.jittered_delay(0), Duration::ZERO);
    }

    #[test]
    fn jitter_never_pushes_past_max_delay() {
        let policy = BackoffPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(2),
        };
        for attempt in 0..5 {
            for _ in 0..50 {
                assert!(policy.jittered_delay(attempt) <= policy.max_delay);
            }
        }
        // at the cap the jitter is absorbed entirely
        assert_eq!(policy.jittered_delay(4), Duration::from_secs(2));
    }
}
