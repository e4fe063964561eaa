//! The Worker Loop: claim, dispatch, report, repeat. This is the piece that
//! composes the Queue API, the Clock, and the Handler Registry; the `worker`
//! binary crate only supplies process wiring (env config, signal handling,
//! the concrete handlers) around a call to [`run_once`]/[`run_forever`].

use crate::clock::Clock;
use crate::error::QueueError;
use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::jobs::JobsRepo;
use serde_json::json;
use std::time::Duration;

/// One iteration: claim a job if one is runnable, dispatch it to its
/// handler, and report the outcome. Returns `true` if a job was claimed
/// (so the caller can skip its idle sleep), `false` if the queue was empty.
///
/// A job whose `job_type` has no registered handler is marked succeeded
/// with a warning result rather than retried or dead-lettered — see the
/// "unknown job type" design note.
pub async fn run_once(
    jobs: &JobsRepo,
    registry: &HandlerRegistry,
    clock: &dyn Clock,
    worker_id: &str,
    lease_seconds: i64,
) -> Result<bool, QueueError> {
    let Some(job) = jobs.claim(worker_id, lease_seconds).await? else {
        return Ok(false);
    };

    tracing::info!(job_id = %job.id, job_type = %job.job_type, %worker_id, "claimed job");

    let Some(handler) = registry.handler_for(&job.job_type) else {
        tracing::warn!(job_id = %job.id, job_type = %job.job_type, "no handler registered");
        jobs.mark_succeeded(
            job.id,
            json!({ "warning": format!("no handler for type={}", job.job_type) }),
        )
        .await?;
        return Ok(true);
    };

    let ctx = HandlerContext {
        attempts: job.attempts,
        clock,
    };

    match handler.invoke(&job.payload, &ctx).await {
        Ok(result) => {
            tracing::info!(job_id = %job.id, "handler succeeded");
            jobs.mark_succeeded(job.id, result).await?;
        }
        Err(err) => {
            tracing::warn!(job_id = %job.id, error = %err, "handler failed");
            jobs.mark_failed(clock, job.id, &err.message).await?;
        }
    }

    Ok(true)
}

/// Runs [`run_once`] forever until `shutdown` resolves. A `QueueError::Fatal`
/// propagates out and ends the loop; a `QueueError::Transient` is logged and
/// the loop pauses briefly before retrying, matching the source's catch-all
/// boundary around everything but the handler itself.
pub async fn run_forever(
    jobs: JobsRepo,
    registry: HandlerRegistry,
    clock: &dyn Clock,
    worker_id: &str,
    lease_seconds: i64,
    poll_interval: Duration,
    mut shutdown: impl std::future::Future<Output = ()> + Unpin,
) -> Result<(), QueueError> {
    loop {
        let tick = run_once(&jobs, &registry, clock, worker_id, lease_seconds);
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!(%worker_id, "shutdown requested, exiting worker loop");
                return Ok(());
            }
            outcome = tick => {
                match outcome {
                    Ok(true) => continue,
                    Ok(false) => tokio::time::sleep(poll_interval).await,
                    Err(QueueError::Transient(e)) => {
                        tracing::warn!(error = %e, "transient store error, retrying shortly");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                    Err(fatal) => return Err(fatal),
                }
            }
        }
    }
}
