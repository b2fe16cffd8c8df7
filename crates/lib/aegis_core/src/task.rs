//! Task helpers for security side effects.
//!
//! [`shield`] runs work on its own task so dropping the caller (an aborted
//! request) does not cancel it; used for audit writes and rate-limit
//! increments. [`spawn_best_effort`] detaches work with its own timeout and
//! contains its failure, used for outbound alerts.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

/// Error returned when a shielded task panicked or the runtime shut down.
#[derive(Debug, thiserror::Error)]
#[error("shielded task failed: {0}")]
pub struct ShieldError(#[from] tokio::task::JoinError);

/// Run `fut` to completion on a separate task and await its result.
///
/// If the awaiting future is dropped, the spawned task keeps running.
pub async fn shield<F>(fut: F) -> Result<F::Output, ShieldError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Ok(tokio::spawn(fut).await?)
}

/// Spawn a detached unit of work bounded by `timeout`. Errors and timeouts
/// are logged, never propagated.
pub fn spawn_best_effort<F, E>(name: &'static str, timeout: Duration, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task = name, error = %e, "best-effort task failed"),
            Err(_) => warn!(task = name, ?timeout, "best-effort task timed out"),
        }
    })
}
