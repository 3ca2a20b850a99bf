//! Caller-side retry with exponential backoff and jitter.
//!
//! The gateway never retries transient failures on its own: every upstream
//! call is billed. Callers that decide a search is worth repeating wrap it in a
//! [`RetryPolicy`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::GatewayError;
use crate::util::timeout::millis;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based), before jitter:
    /// `initial × multiplier^attempt`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()).max(0.0))
    }

    /// Execute an async operation, retrying errors that are
    /// [`GatewayError::is_retryable`].
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        if self.max_attempts == 0 {
            return Err(GatewayError::InvalidArgument(
                "retry policy allows zero attempts".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 >= self.max_attempts {
                        return Err(e);
                    }

                    // Jitter: 75%–125% of backoff
                    let jitter_factor = rand::thread_rng().gen_range(0.75..=1.25);
                    let sleep_duration = self.backoff_for(attempt).mul_f64(jitter_factor);

                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_ms = millis(sleep_duration),
                        error = %e,
                        "Retrying after error"
                    );

                    tokio::time::sleep(sleep_duration).await;
                    attempt += 1;
                }
            }
        }
    }
}
