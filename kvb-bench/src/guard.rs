//! Per-call deadline enforcement.

use std::future::Future;
use std::time::Duration;

use kvb_common::{KdfError, TaskError};

/// Race one invocation against a deadline.
///
/// If the operation settles first its result or error is returned and the
/// timer future is dropped; the timer is released on every exit path. If the
/// deadline elapses first the call fails with [`TaskError::Timeout`] carrying
/// `label`, and the underlying operation is abandoned rather than cancelled:
/// it may still run to completion on the blocking pool and its result is
/// discarded. Under a sustained timeout storm those stragglers keep occupying
/// blocking threads until they finish - a known, accepted leak risk.
pub async fn with_deadline<T, F>(op: F, deadline: Duration, label: &str) -> Result<T, TaskError>
where
    F: Future<Output = Result<T, KdfError>>,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result.map_err(TaskError::from),
        Err(_) => Err(TaskError::Timeout {
            label: label.to_string(),
            deadline_ms: deadline.as_millis() as u64,
        }),
    }
}
