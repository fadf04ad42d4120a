//! Bounded exponential backoff with jitter around a single provider call

use std::future::Future;
use std::time::Duration;
use rand::Rng;

use shared::{run_error, run_warn, ApiFailure, ProviderConfig, ProviderId};
use crate::error::{DispatchError, DispatchResult};

/// Retry budget for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    provider: ProviderId,
    max_retries: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    /// `max_retries` counts total attempts and is clamped to at least one
    pub fn new(provider: ProviderId, max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            provider,
            max_retries: max_retries.max(1),
            initial_delay,
        }
    }

    pub fn from_config(provider: ProviderId, config: &ProviderConfig) -> Self {
        Self::new(provider, config.max_retries, config.initial_delay())
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Deterministic part of the delay after a failed `attempt` (1-indexed)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    /// Delay after a failed `attempt`: `initial * 2^(attempt-1) + U[0, 1)` seconds
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.base_delay(attempt) + Duration::from_secs_f64(jitter)
    }

    /// Run `op` until it succeeds or the attempt budget is spent
    ///
    /// The error of the final attempt is returned inside
    /// [`DispatchError::RetriesExhausted`].
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> DispatchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(failure) if attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    run_warn!(
                        provider = %self.provider,
                        attempt,
                        "⚠️ API error: {}. Retrying in {:.1}s (attempt {}/{})...",
                        failure,
                        delay.as_secs_f64(),
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    run_error!(
                        provider = %self.provider,
                        "❌ Maximum retries ({}) exceeded. Last error: {}",
                        self.max_retries,
                        failure
                    );
                    return Err(DispatchError::RetriesExhausted {
                        provider: self.provider,
                        attempts: attempt,
                        last: failure,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<&'static str, ApiFailure>> {
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= failures {
                std::future::ready(Err(ApiFailure::NetworkError(format!("failure #{call}"))))
            } else {
                std::future::ready(Ok("done"))
            }
        }
    }

    #[test]
    fn test_backoff_delay_bounds() {
        let policy = RetryPolicy::new(ProviderId::OpenAI, 5, Duration::from_secs(2));
        for attempt in 1..=4 {
            let lower = Duration::from_secs(2 * 2u64.pow(attempt - 1));
            let upper = lower + Duration::from_secs(1);
            for _ in 0..50 {
                let delay = policy.backoff_delay(attempt);
                assert!(delay >= lower, "attempt {attempt}: {delay:?} < {lower:?}");
                assert!(delay < upper, "attempt {attempt}: {delay:?} >= {upper:?}");
            }
        }
    }

    #[test]
    fn test_base_delay_saturates() {
        let policy = RetryPolicy::new(ProviderId::Together, 100, Duration::from_secs(5));
        assert_eq!(policy.base_delay(1), Duration::from_secs(5));
        assert_eq!(policy.base_delay(3), Duration::from_secs(20));
        assert_eq!(policy.base_delay(80), Duration::from_secs(5).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_zero_retries_clamped() {
        let policy = RetryPolicy::new(ProviderId::Gemini, 0, Duration::ZERO);
        assert_eq!(policy.max_retries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(ProviderId::Claude, 5, Duration::from_millis(10));

        let result = policy.retry(flaky(3, calls.clone())).await.unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_does_not_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(ProviderId::Claude, 5, Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        policy.retry(flaky(0, calls.clone())).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_propagates_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(ProviderId::Together, 4, Duration::from_millis(10));

        let err = policy.retry(flaky(u32::MAX, calls.clone())).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match err {
            DispatchError::RetriesExhausted { provider, attempts, last } => {
                assert_eq!(provider, ProviderId::Together);
                assert_eq!(attempts, 4);
                assert_eq!(last, ApiFailure::NetworkError("failure #4".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_exponentially_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(ProviderId::OpenAI, 5, Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        policy.retry(flaky(2, calls.clone())).await.unwrap();

        let elapsed = start.elapsed();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s of backoff plus at most 1s of jitter per sleep
        assert!(elapsed >= Duration::from_secs(6), "slept only {elapsed:?}");
        assert!(elapsed < Duration::from_secs(8), "slept too long {elapsed:?}");
    }
}
