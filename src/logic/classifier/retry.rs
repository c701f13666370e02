//! Bounded retry policy for classifier calls
//!
//! Exponential backoff with optional jitter. Every attempt is wrapped in a
//! timeout, a server-suggested wait never exceeds `max_backoff`, and the total
//! number of attempts is `max_retries + 1`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::types::ClassifierError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// 0.0 - 1.0, fraction of the delay randomised either way
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::constants::DEFAULT_CLASSIFIER_MAX_RETRIES,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No sleeping between attempts
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (0-based), without jitter
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry as i32);
        let delay = self.initial_backoff.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }

    /// The full backoff schedule, one entry per retry
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|r| self.backoff_for(r)).collect()
    }

    /// Upper bound on wall time spent in `run`
    pub fn worst_case(&self, attempt_timeout: Duration) -> Duration {
        let sleeping: Duration = (0..self.max_retries).map(|_| self.max_backoff).sum();
        attempt_timeout * self.max_attempts() + sleeping
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = self.jitter.min(1.0);
        let factor = rand::thread_rng().gen_range((1.0 - spread)..=(1.0 + spread));
        Duration::from_secs_f64(delay.as_secs_f64() * factor).min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or the budget is spent
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        attempt_timeout: Duration,
        mut op: F,
    ) -> Result<T, ClassifierError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifierError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ClassifierError::Timeout(attempt_timeout)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("[{}] classifier succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts() => {
                    let delay = e
                        .suggested_backoff()
                        .map(|d| d.min(self.max_backoff))
                        .unwrap_or_else(|| self.jittered(self.backoff_for(attempt - 1)));

                    log::warn!(
                        "[{}] classifier attempt {}/{} failed: {} (retrying in {:?})",
                        label,
                        attempt,
                        self.max_attempts(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        log::warn!("[{}] classifier gave up after {} attempts: {}", label, attempt, e);
                    } else {
                        log::warn!("[{}] classifier failed permanently: {}", label, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
