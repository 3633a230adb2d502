//! Dispatch loop: feeds planned jobs into a bounded worker pool.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::table::SharedTable;
use crate::planner::Job;
use crate::reporter::RunSummary;
use crate::transfer::{Outcome, Transfer};

pub(super) struct RunContext {
    pub(super) transfer: Arc<dyn Transfer>,
    pub(super) table: SharedTable,
    pub(super) cancel: CancellationToken,
    pub(super) parallelism: usize,
}

/// Run every job to a terminal state and return the summary.
///
/// Jobs are dispatched in planned order from this single task. Acquiring a
/// pool slot blocks further dispatch until a running worker returns; the
/// cancellation token is re-checked before each dispatch. The summary is
/// built only after every spawned worker has been joined.
pub(super) async fn run_jobs(ctx: RunContext, jobs: Vec<Job>) -> RunSummary {
    let RunContext {
        transfer,
        table,
        cancel,
        parallelism,
    } = ctx;

    let total = jobs.len();
    let pool = Arc::new(Semaphore::new(parallelism));
    let mut workers = JoinSet::new();

    tracing::info!(jobs = total, parallelism, "Starting download run");

    for job in jobs {
        if cancel.is_cancelled() {
            tracing::info!(job = %job.id, "Cancellation observed, no further jobs dispatched");
            break;
        }

        if job.skip_existing && destination_exists(&job).await {
            tracing::debug!(job = %job.id, file = %job.file_name, "Destination exists, skipping");
            table.mark_skipped(job.id);
            continue;
        }

        // Acquire a pool slot (blocks dispatch while the pool is saturated)
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(job = %job.id, "Cancelled while waiting for a pool slot");
                break;
            }
            permit = pool.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        if !table.mark_in_progress(job.id) {
            continue;
        }
        tracing::debug!(job = %job.id, url = %job.source_url, "Dispatching transfer");

        let transfer = Arc::clone(&transfer);
        let table = table.clone();
        let cancel = cancel.clone();
        workers.spawn(async move {
            let _permit = permit;
            let id = job.id;
            let progress_table = table.clone();
            let on_progress = move |done: u64, expected: Option<u64>| {
                progress_table.progress(id, done, expected);
            };

            let outcome = transfer.execute(&job, &cancel, &on_progress).await;
            match &outcome {
                Outcome::Succeeded { bytes } => {
                    tracing::info!(job = %id, file = %job.file_name, bytes, "Download complete");
                }
                Outcome::Failed(e) => {
                    tracing::warn!(job = %id, file = %job.file_name, error = %e, "Download failed");
                }
                Outcome::Cancelled => {
                    tracing::info!(job = %id, file = %job.file_name, "Download cancelled");
                }
            }
            table.finish(id, outcome);
        });
    }

    // Final barrier: every dispatched transfer must return before the summary
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Download worker panicked");
        }
    }

    table.fail_orphans();
    let never_started = table.cancel_unstarted();
    if never_started > 0 {
        tracing::info!(jobs = never_started, "Jobs left undispatched were cancelled");
    }

    let summary = table.summarize();
    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "Download run finished"
    );
    table.emit_finished(&summary);
    summary
}

async fn destination_exists(job: &Job) -> bool {
    match tokio::fs::try_exists(&job.destination).await {
        Ok(exists) => exists,
        Err(e) => {
            tracing::warn!(
                job = %job.id,
                path = %job.destination.display(),
                error = %e,
                "Could not check destination, downloading anyway"
            );
            false
        }
    }
}
