//! Bounded retry policy shared by connection establishment and
//! characteristic exchanges.

use std::future::Future;
use std::time::Duration;

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: E,
    },
    /// An attempt failed with an error that must not be retried.
    Aborted {
        /// The attempt that failed (1-based).
        attempt: u32,
        /// The error it failed with.
        error: E,
    },
}

/// Attempt count and fixed backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Create a policy. A `max_attempts` of zero is treated as one.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between consecutive attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn worst_case_wait(&self) -> Duration {
        self.interval * (self.max_attempts - 1)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    ///
    /// `operation` receives the 1-based attempt number. `on_failure` is called
    /// for every retryable failure, including the last one. The policy sleeps
    /// `interval` between attempts but not after the final one.
    pub async fn run<T, E, F, Fut, P, R>(
        &self,
        mut operation: F,
        is_retryable: P,
        mut on_failure: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        R: FnMut(u32, &E),
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if !is_retryable(&error) => {
                    return Err(RetryError::Aborted { attempt, error });
                }
                Err(error) => {
                    on_failure(attempt, &error);

                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: error,
                        });
                    }

                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<u32, RetryError<&str>> = policy
            .run(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err("flaky")
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |_| true,
                |_, _| {},
            )
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_millis(5));
        let mut failures = Vec::new();
        let start = Instant::now();

        let result: Result<(), RetryError<&str>> = policy
            .run(
                |_| async { Err("down") },
                |_| true,
                |attempt, _| failures.push(attempt),
            )
            .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: "down"
            })
        );
        assert_eq!(failures, vec![1, 2, 3, 4]);
        assert!(start.elapsed() >= policy.worst_case_wait());
    }

    #[tokio::test]
    async fn test_aborts_on_fatal_error() {
        let policy = RetryPolicy::new(10, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<&str>> = policy
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("unsupported") }
                },
                |e: &&str| *e != "unsupported",
                |_, _| panic!("fatal errors are not reported as retries"),
            )
            .await;

        assert_eq!(
            result,
            Err(RetryError::Aborted {
                attempt: 1,
                error: "unsupported"
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.worst_case_wait(), Duration::ZERO);
    }
}
