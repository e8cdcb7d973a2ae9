//! Bounded retry for optimistic-concurrency conflicts
//!
//! Only errors the caller classifies as conflicts are retried; everything else
//! returns on the first failure. Waits between attempts honour cancellation.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Attempt count and delay schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub steps: u32,
    pub initial_delay: Duration,
    /// Delay multiplier between attempts
    pub factor: f64,
    /// Fraction of the delay added as random jitter
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            steps: 5,
            initial_delay: Duration::from_millis(10),
            factor: 1.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        if self.factor > 1.0 {
            current.mul_f64(self.factor)
        } else {
            current
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay + delay.mul_f64(extra)
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt hit a conflict
    Exhausted { attempts: u32, last: E },
    /// A non-conflict error, returned as-is
    Failed(E),
    /// The token fired while waiting between attempts
    Cancelled,
}

/// Run `attempt_fn` until it succeeds, fails with a non-conflict error, or
/// the policy runs out of attempts.
pub async fn retry_on_conflict<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
    mut is_conflict: C,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: FnMut(&E) -> bool,
{
    let steps = policy.steps.max(1);
    let mut delay = policy.initial_delay;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_conflict(&e) => return Err(RetryError::Failed(e)),
            Err(e) if attempt >= steps => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                })
            }
            Err(e) => {
                let wait = policy.jittered(delay);
                debug!(
                    attempt,
                    steps,
                    delay_ms = wait.as_millis() as u64,
                    error = %e,
                    "Conflict, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
                delay = policy.next_delay(delay);
            }
        }
    }
}
