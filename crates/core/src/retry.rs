//! Bounded retry with exponential backoff and jitter around remote calls.

use crate::{BenchError, BenchResult};
use orbit_bench_inference::InferenceError;
use rand::Rng;
use std::thread::sleep;
use std::time::Duration;

/// A remote call that kept failing.
#[derive(Debug, thiserror::Error)]
#[error("{error} (gave up after {attempts} attempt(s))")]
pub struct RetryExhausted {
    pub attempts: u32,
    #[source]
    pub error: InferenceError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidConfig`] if `max_attempts` is zero or `max_delay` is
    /// shorter than `base_delay`.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> BenchResult<Self> {
        if max_attempts == 0 {
            return Err(BenchError::InvalidConfig(
                "max attempts must be at least 1".into(),
            ));
        }
        if max_delay < base_delay {
            return Err(BenchError::InvalidConfig(format!(
                "max retry delay ({:?}) is shorter than the base delay ({:?})",
                max_delay, base_delay
            )));
        }

        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
        })
    }

    /// One attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the next attempt, after `failures` failed attempts.
    ///
    /// Doubles from `base_delay` and is capped at `max_delay`. [`run`](Self::run) adds jitter.
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        backoff.min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the attempt budget
    /// is spent. `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Result<T, InferenceError>,
    {
        let mut rng = rand::thread_rng();
        let base_ms = self.base_delay.as_millis() as u64;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_transient() || attempt >= self.max_attempts {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            error,
                        });
                    }

                    let backoff = self.delay_for_attempt(attempt);
                    let jitter = Duration::from_millis(rng.gen_range(0..=base_ms));
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        self.max_attempts,
                        error,
                        backoff + jitter
                    );
                    sleep(backoff + jitter);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> InferenceError {
        InferenceError::Status {
            status: 503,
            message: "overloaded".into(),
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO, Duration::ZERO).unwrap()
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = fast(4).run("call", |_| {
            calls += 1;
            if calls < 3 {
                Err(transient())
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = fast(3).run("call", |_| {
            calls += 1;
            Err(transient())
        });
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_transient_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = fast(5).run("call", |_| {
            calls += 1;
            Err(InferenceError::Status {
                status: 401,
                message: "bad key".into(),
            })
        });
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let policy = RetryPolicy::new(
            10,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .unwrap();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_millis(500));
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).is_err());
        assert!(RetryPolicy::new(1, Duration::from_secs(2), Duration::from_secs(1)).is_err());
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }
}
