// Bounded retry for caller-side resiliency (schema setup, bootstrap)
//
// QueueClient itself never retries; callers wrap the operations they
// consider safe to repeat.
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Delay between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay after every failed attempt
    Fixed(Duration),
    /// delay = base * factor ^ (attempt - 1), capped at `max`
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

/// Retry policy: attempt count plus backoff
///
/// # Example
/// ```text
/// let policy = RetryPolicy::fixed(5, Duration::from_secs(2));
/// policy.run("create extension", || setup(&pool)).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Create a new retry policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    pub fn exponential(max_attempts: u32, base: Duration, factor: f64, max: Duration) -> Self {
        Self::new(max_attempts, Backoff::Exponential { base, factor, max })
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { base, factor, max } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = base.as_secs_f64() * factor.powi(exp);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs.max(0.0))
                }
            }
        }
    }

    /// Run `op` until it succeeds or attempts run out; returns the last error
    pub async fn run<T, E, F, Fut>(&self, op_name: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_if(op_name, op, |_| true).await
    }

    /// Like `run`, but stops at the first error `should_retry` rejects
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        op_name: &str,
        mut op: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(op = op_name, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_attempts && should_retry(&e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        op = op_name,
                        attempt,
                        error = %e,
                        "Giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Five attempts, two seconds apart
    fn default() -> Self {
        use crate::application::constants::{SETUP_RETRY_ATTEMPTS, SETUP_RETRY_DELAY};
        Self::fixed(SETUP_RETRY_ATTEMPTS, SETUP_RETRY_DELAY)
    }
}
