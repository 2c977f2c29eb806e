//! Retry with bounded exponential backoff for external calls.
//!
//! A failure without a status code is treated as transient and retried; a
//! status outside `retryable_codes` fails immediately. Otherwise the executor
//! sleeps `min(initial_delay_ms * backoff_multiplier^attempt, max_delay_ms)`
//! and tries again, for at most `max_retries + 1` attempts in total.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Errors that can tell the executor which status code (if any) they carry.
pub trait RetryClassify {
    fn status_code(&self) -> Option<u16>;
}

/// Backoff policy for one external call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = run once).
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    /// Hard ceiling for any single wait.
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub retryable_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            retryable_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests and offline tooling.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `attempt` (0-based: the first retry waits `initial_delay_ms`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Whether a failure with this status may be retried.
    pub fn is_retryable(&self, status: Option<u16>) -> bool {
        match status {
            None => true,
            Some(code) => self.retryable_codes.contains(&code),
        }
    }
}

/// Record-and-continue result of a retried call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T, E> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<E>,
    /// Number of attempts made (1 = no retries used).
    pub attempts: u32,
}

/// Run `op` under `policy`, returning the first success or the last error.
pub async fn execute<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClassify + std::fmt::Display,
{
    let (result, _) = run_attempts(policy, op).await;
    result
}

/// Non-unwinding variant: always returns an outcome with the attempt count.
pub async fn execute_recorded<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClassify + std::fmt::Display,
{
    match run_attempts(policy, op).await {
        (Ok(data), attempts) => RetryOutcome {
            success: true,
            data: Some(data),
            error: None,
            attempts,
        },
        (Err(error), attempts) => RetryOutcome {
            success: false,
            data: None,
            error: Some(error),
            attempts,
        },
    }
}

async fn run_attempts<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> (Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClassify + std::fmt::Display,
{
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return (Ok(value), attempt),
            Err(err) => err,
        };

        let status = err.status_code();
        if !policy.is_retryable(status) {
            return (Err(err), attempt);
        }
        if attempt >= max_attempts {
            return (Err(err), attempt);
        }

        let delay = policy.delay_for(attempt - 1);
        warn!(
            event = "call.retry",
            attempt = attempt,
            status = ?status,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retryable failure, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Fail(Option<u16>);

    impl RetryClassify for Fail {
        fn status_code(&self) -> Option<u16> {
            self.0
        }
    }

    impl std::fmt::Display for Fail {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fail {:?}", self.0)
        }
    }

    #[test]
    fn test_policy_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.initial_delay_ms, 1_000);
        assert_eq!(p.max_delay_ms, 30_000);
        assert_eq!(p.retryable_codes, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn test_delay_grows_then_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(p.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(p.delay_for(4), Duration::from_millis(16_000));
        assert_eq!(p.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_missing_status_is_retryable() {
        let p = RetryPolicy::default();
        assert!(p.is_retryable(None));
        assert!(p.is_retryable(Some(503)));
        assert!(!p.is_retryable(Some(400)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_500s_then_success_waits_1s_then_2s() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let start = tokio::time::Instant::now();
        let log = calls.clone();

        let result: Result<&str, Fail> = execute(&RetryPolicy::default(), move || {
            let log = log.clone();
            async move {
                let mut log = log.lock().unwrap();
                log.push(start.elapsed());
                if log.len() < 3 {
                    Err(Fail(Some(500)))
                } else {
                    Ok("digest")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "digest");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(1_000));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_fails_after_one_call() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let outcome = execute_recorded(&RetryPolicy::default(), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Fail(Some(400)))
            }
        })
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let outcome = execute_recorded(&RetryPolicy::default(), move || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                // transport failure on the last attempt, 503 before
                if n < 3 {
                    Err::<(), _>(Fail(Some(503)))
                } else {
                    Err(Fail(None))
                }
            }
        })
        .await;

        assert_eq!(outcome.attempts, 4);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.error.unwrap().0, None);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let outcome = execute_recorded(&RetryPolicy::immediate(0), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Fail(Some(503)))
            }
        })
        .await;

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.success);
        assert!(outcome.data.is_none());
    }
}
