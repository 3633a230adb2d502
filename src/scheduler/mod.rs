//! Scheduler: bounded worker pool, per-job state machine and run handles.
//!
//! - [`table`] - Job state table and the counters derived from it
//! - [`dispatch`] - The single coordinating task that feeds the pool

mod dispatch;
mod table;


pub use table::JobState;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::clamp_parallelism;
use crate::error::{Error, Result};
use crate::planner::Job;
use crate::reporter::RunSummary;
use crate::transfer::Transfer;
use crate::types::Event;
use dispatch::{RunContext, run_jobs};
use table::SharedTable;

/// Runs job lists on a bounded pool of transfers
#[derive(Clone)]
pub struct Scheduler {
    transfer: Arc<dyn Transfer>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl Scheduler {
    /// Create a scheduler that executes jobs with `transfer` and publishes on `event_tx`
    pub fn new(transfer: Arc<dyn Transfer>, event_tx: tokio::sync::broadcast::Sender<Event>) -> Self {
        Self { transfer, event_tx }
    }

    /// Start a run in the background
    ///
    /// `parallelism` is clamped to 1..=16. Each run gets its own cancellation
    /// token; it is never shared with another run. Must be called from within
    /// a Tokio runtime.
    ///
    /// Events go to the shared broadcast channel, where a slow subscriber may
    /// lag, and to a lossless per-run stream available from
    /// [`RunHandle::take_events`].
    pub fn start(&self, jobs: Vec<Job>, parallelism: usize) -> RunHandle {
        let parallelism = clamp_parallelism(parallelism);
        let cancel = CancellationToken::new();
        let active = Arc::new(AtomicBool::new(true));
        let (run_tx, run_rx) = mpsc::unbounded_channel();
        let table = SharedTable::new(jobs.clone(), self.event_tx.clone(), run_tx);

        let ctx = RunContext {
            transfer: Arc::clone(&self.transfer),
            table: table.clone(),
            cancel: cancel.clone(),
            parallelism,
        };

        let run_active = Arc::clone(&active);
        let task = tokio::spawn(async move {
            let summary = run_jobs(ctx, jobs).await;
            run_active.store(false, Ordering::SeqCst);
            summary
        });

        RunHandle {
            cancel,
            active,
            table,
            task,
            events: Some(run_rx),
        }
    }

    /// Run to completion
    pub async fn run(&self, jobs: Vec<Job>, parallelism: usize) -> Result<RunSummary> {
        self.start(jobs, parallelism).wait().await
    }
}

/// Handle to a run in progress
pub struct RunHandle {
    cancel: CancellationToken,
    active: Arc<AtomicBool>,
    table: SharedTable,
    task: tokio::task::JoinHandle<RunSummary>,
    events: Option<mpsc::UnboundedReceiver<Event>>,
}

impl RunHandle {
    /// Request cooperative cancellation
    ///
    /// No job is dispatched after the dispatcher observes this. Running
    /// transfers stop at their next read or chunk write and delete their
    /// temp files. Idempotent.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Cancellation requested");
        }
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A clone of this run's cancellation token
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True until every worker has returned and the summary is final
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Take this run's event stream
    ///
    /// Unlike [`ArchiveDownloader::subscribe`](crate::ArchiveDownloader::subscribe),
    /// nothing is dropped: every state change and progress event of this run
    /// is delivered in order, starting from the first. The stream ends after
    /// [`Event::RunFinished`]. Returns `None` if already taken.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.events.take()
    }

    /// Snapshot of every job's state, in planned order
    pub fn job_states(&self) -> Vec<JobState> {
        self.table.states()
    }

    /// Wait for the run to finish and take its summary
    pub async fn wait(self) -> Result<RunSummary> {
        self.task
            .await
            .map_err(|e| Error::RunAborted(e.to_string()))
    }
}
