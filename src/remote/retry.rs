use crate::remote::traits::RemoteError;
use std::future::Future;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bounded retry with exponential backoff, plus an optional per-attempt
/// timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            attempt_timeout: None,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The last error is returned.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;
        let mut backoff = self.initial_backoff;

        loop {
            attempts += 1;

            let result = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(RemoteError::Timeout(limit)),
                },
                None => operation().await,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempts >= max_attempts => {
                    if attempts > 1 {
                        tracing::error!(
                            request = %label,
                            attempts = attempts,
                            error = %e,
                            "Request failed after retries"
                        );
                    }
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        request = %label,
                        attempt = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            attempt_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RemoteError::Service("throttled".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(2)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::Service("down".to_string()))
            })
            .await;

        assert!(matches!(result, Err(RemoteError::Service(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(5)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::GroupNotFound("missing".to_string()))
            })
            .await;

        assert!(matches!(result, Err(RemoteError::GroupNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let policy = RetryPolicy {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            attempt_timeout: Some(Duration::from_millis(10)),
        };

        let result: Result<(), _> = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RemoteError::Timeout(_))));
    }
}
