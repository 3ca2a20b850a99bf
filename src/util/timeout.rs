//! Deadline helper.

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

/// Run `future` under a deadline.
///
/// When the deadline elapses the future is dropped, which cancels any
/// in-flight HTTP call it owns, and [`GatewayError::Timeout`] is returned.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(millis(duration))),
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
