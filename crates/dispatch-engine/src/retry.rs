//! Retry with jittered exponential backoff
//!
//! The delay before retry `n` (n ≥ 1) is `min(base × 2^(n-1), max)` scaled by
//! a factor drawn uniformly from [0.5, 1.5]. The wait is a tokio sleep, so a
//! backing-off action never holds up other in-flight actions.
//!
//! A throttled attempt may carry the platform's retry-after hint. The hint,
//! capped at the max delay, is a floor on the jittered delay.

use crate::config::duration_ms;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Lowest jitter factor applied to a backoff delay
pub const JITTER_MIN: f64 = 0.5;
/// Highest jitter factor applied to a backoff delay
pub const JITTER_MAX: f64 = 1.5;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, before jitter
    #[serde(rename = "baseDelayMs", with = "duration_ms")]
    pub base_delay: Duration,
    /// Cap on any delay, before jitter
    #[serde(rename = "maxDelayMs", with = "duration_ms")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// What a single attempt produced
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Done; stop retrying
    Success(T),
    /// Failed in a way another attempt may fix
    Retryable(E),
    /// The platform throttled the attempt and may have said how long to wait
    Throttled(E, Option<Duration>),
    /// Failed in a way no retry will fix
    Fatal(E),
}

/// The last error once retrying stops
#[derive(Debug)]
pub struct RetryError<E> {
    /// Last error seen
    pub error: E,
    /// Attempts made
    pub attempts: u32,
    /// True if the attempt budget ran out, false if a fatal error stopped it
    pub exhausted: bool,
}

impl RetryConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// First attempt plus retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Un-jittered delay before retry `retry` (1-based)
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Jittered delay before retry `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
        self.base_delay_for(retry).mul_f64(factor)
    }

    /// Jittered delay before retry `retry`, but never shorter than the
    /// platform's retry-after hint (itself capped at the max delay)
    pub fn delay_honoring(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.delay_for(retry);
        match retry_after {
            Some(hint) => delay.max(hint.min(self.max_delay)),
            None => delay,
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or `max_attempts`
    /// attempts have been made
    ///
    /// The operation receives the 1-based attempt number. On success the
    /// value is returned with the number of attempts it took.
    pub async fn run<F, Fut, T, E>(
        &self,
        max_attempts: u32,
        mut operation: F,
    ) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let (error, retry_after) = match operation(attempt).await {
                Attempt::Success(value) => return Ok((value, attempt)),
                Attempt::Fatal(error) => {
                    return Err(RetryError {
                        error,
                        attempts: attempt,
                        exhausted: false,
                    })
                }
                Attempt::Retryable(error) => (error, None),
                Attempt::Throttled(error, hint) => (error, hint),
            };

            if attempt >= max_attempts {
                return Err(RetryError {
                    error,
                    attempts: attempt,
                    exhausted: true,
                });
            }

            let delay = self.delay_honoring(attempt, retry_after);
            tracing::debug!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                throttled = retry_after.is_some(),
                "Backing off before retry"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_attempts(), 4);
        assert_eq!(config.base_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_base_delay_doubles_and_caps() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000));

        assert_eq!(config.base_delay_for(1), Duration::from_millis(100));
        assert_eq!(config.base_delay_for(2), Duration::from_millis(200));
        assert_eq!(config.base_delay_for(3), Duration::from_millis(400));
        assert_eq!(config.base_delay_for(4), Duration::from_millis(800));
        assert_eq!(config.base_delay_for(5), Duration::from_millis(1000));
        assert_eq!(config.base_delay_for(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_jittered_delay_stays_in_band() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(30));

        for retry in 1..=4 {
            let base = config.base_delay_for(retry);
            for _ in 0..200 {
                let delay = config.delay_for(retry);
                assert!(delay >= base.mul_f64(JITTER_MIN), "{delay:?} below band for {retry}");
                assert!(delay <= base.mul_f64(JITTER_MAX), "{delay:?} above band for {retry}");
            }
        }
    }

    #[test]
    fn test_cap_applies_before_jitter() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(15));

        for _ in 0..100 {
            let delay = config.delay_for(3);
            assert!(delay >= Duration::from_millis(7500));
            assert!(delay <= Duration::from_millis(22500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_succeeds_on_last_attempt() {
        let config = RetryConfig::new().with_max_retries(2);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = config
            .run(config.max_attempts(), |_| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Attempt::Retryable("transient")
                    } else {
                        Attempt::Success("ok")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, ("ok", 3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts_budget() {
        let config = RetryConfig::new().with_max_retries(3);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let err = config
            .run(config.max_attempts(), |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Attempt::<(), _>::Retryable(attempt) }
            })
            .await
            .unwrap_err();

        assert!(err.exhausted);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.error, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_fatal() {
        let config = RetryConfig::new();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let err = config
            .run(config.max_attempts(), |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Attempt::<(), _>::Fatal("bad request") }
            })
            .await
            .unwrap_err();

        assert!(!err.exhausted);
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_between_attempts() {
        let config = RetryConfig::new()
            .with_max_retries(2)
            .with_base_delay(Duration::from_millis(1000));

        let start = tokio::time::Instant::now();
        let _ = config
            .run(config.max_attempts(), |_| async { Attempt::<(), _>::Retryable(()) })
            .await;

        // 1000ms and 2000ms base delays, each jittered down by at most half
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(start.elapsed() <= Duration::from_millis(4500));
    }

    #[test]
    fn test_retry_after_floors_delay() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(10));

        for _ in 0..100 {
            let delay = config.delay_honoring(1, Some(Duration::from_secs(4)));
            assert_eq!(delay, Duration::from_secs(4));
        }
        // A hint shorter than the backoff changes nothing
        let delay = config.delay_honoring(1, Some(Duration::from_millis(1)));
        assert!(delay >= Duration::from_millis(50));
        assert!(delay <= Duration::from_millis(150));
    }

    #[test]
    fn test_retry_after_is_capped_at_max_delay() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2));

        let delay = config.delay_honoring(1, Some(Duration::from_secs(3600)));
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_out_throttle_hint() {
        let config = RetryConfig::new()
            .with_max_retries(1)
            .with_base_delay(Duration::from_millis(100));

        let start = tokio::time::Instant::now();
        let result = config
            .run(config.max_attempts(), |attempt| async move {
                if attempt == 1 {
                    Attempt::Throttled("429", Some(Duration::from_secs(5)))
                } else {
                    Attempt::Success(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, (2, 2));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_attempts_count_against_budget() {
        let config = RetryConfig::new().with_max_retries(2);

        let err = config
            .run(config.max_attempts(), |_| async {
                Attempt::<(), _>::Throttled("429", None)
            })
            .await
            .unwrap_err();

        assert!(err.exhausted);
        assert_eq!(err.attempts, 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let config = RetryConfig::new();
        let result = config
            .run(0, |_| async { Attempt::<_, ()>::Success(7) })
            .await
            .unwrap();
        assert_eq!(result, (7, 1));
    }
}
