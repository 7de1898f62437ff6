use crate::domain::{PipelineError, PipelineResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff retry policy for transient failures.
///
/// Non-transient errors (validation, illegal input) propagate immediately
/// without consuming attempts. When the budget is exhausted the last error
/// is surfaced as a terminal failure carrying the attempt count.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (1-based: the sleep after attempt n).
    pub fn backoff_interval(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let interval = self.initial_interval.mul_f64(factor);
        interval.min(self.max_interval)
    }

    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) => {
                    if attempt >= max_attempts {
                        return Err(PipelineError::Terminal(format!(
                            "retry budget exhausted after {} attempts: {}",
                            attempt, error
                        )));
                    }
                    let backoff = self.backoff_interval(attempt);
                    warn!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
