//! Bounded retry for inference calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempts per call unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How many times an operation is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// A policy with `max_attempts` attempts (at least one) and no delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    /// Wait `delay` between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `op` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempt budget is spent. The closure receives the
    /// 1-based attempt number. The last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut, R>(&self, is_retryable: R, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }

                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "attempt failed, retrying"
                    );

                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`RetryPolicy::run`], but maps the final error to a value with
    /// `fallback` so the caller always gets a result.
    pub async fn run_or_else<T, E, F, Fut, R, G>(&self, is_retryable: R, op: F, fallback: G) -> T
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
        G: FnOnce(E) -> T,
    {
        match self.run(is_retryable, op).await {
            Ok(value) => value,
            Err(err) => fallback(err),
        }
    }
}
