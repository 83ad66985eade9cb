use std::future::Future;
use std::time::Duration;

use tracing::warn;

use nd_core::{Error, Result};

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the retry following the given attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs
/// out of attempts.
pub async fn retry<T, F, Fut, P>(policy: RetryPolicy, is_retryable: P, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts && is_retryable(&e) => {
                warn!(
                    "⚠️ Attempt {}/{} failed, retrying: {}",
                    attempt, policy.attempts, e
                );
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_grows_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let counter = calls.clone();
        let result = retry(policy, Error::is_transient, move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Error::Connection("connection refused".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_fail_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let counter = calls.clone();
        let result: Result<()> = retry(policy, Error::is_transient, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Duplicate("already there".to_string()))
            }
        })
        .await;
        assert!(matches!(result, Err(Error::Duplicate(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let counter = calls.clone();
        let result: Result<()> = retry(policy, Error::is_transient, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Connection("still down".to_string()))
            }
        })
        .await;
        assert!(matches!(result, Err(Error::Connection(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
