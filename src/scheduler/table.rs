//! Run table: per-job state plus the counters derived from it, behind one lock.
//!
//! Every transition, progress update and emitted event goes through the same
//! mutex, so counters can never disagree with the job states they summarize.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TransferError;
use crate::planner::Job;
use crate::reporter::{self, RunSummary};
use crate::transfer::Outcome;
use crate::types::{Event, JobId, Status, progress_fraction};

/// Emit a progress event for unknown-length transfers at most once per this many bytes
const INDETERMINATE_PROGRESS_STEP: u64 = 256 * 1024;

/// Mutable state of one job, owned by the scheduler
#[derive(Clone, Debug, PartialEq)]
pub struct JobState {
    /// Current status
    pub status: Status,
    /// Bytes written so far
    pub bytes_transferred: u64,
    /// Declared content length, if known
    pub bytes_expected: Option<u64>,
    /// Failure reason, set only for `Failed`
    pub error: Option<TransferError>,
}

impl JobState {
    fn queued() -> Self {
        Self {
            status: Status::Queued,
            bytes_transferred: 0,
            bytes_expected: None,
            error: None,
        }
    }

    /// Progress in `[0.0, 1.0]`; `None` while the length is unknown
    pub fn progress_fraction(&self) -> Option<f64> {
        match self.status {
            Status::Succeeded | Status::Skipped => Some(1.0),
            _ => progress_fraction(self.bytes_transferred, self.bytes_expected),
        }
    }
}

pub(crate) struct RunTable {
    jobs: Vec<Job>,
    states: Vec<JobState>,
    positions: HashMap<JobId, usize>,
    finished: usize,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    // Lossless per-run sink; dropped after `RunFinished` so receivers see the end
    run_tx: Option<tokio::sync::mpsc::UnboundedSender<Event>>,
}

impl RunTable {
    fn emit(&self, event: Event) {
        // No subscribers (or a dropped run receiver) is not an error
        if let Some(run_tx) = &self.run_tx {
            run_tx.send(event.clone()).ok();
        }
        self.event_tx.send(event).ok();
    }

    fn position(&self, id: JobId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    fn emit_run_progress(&self) {
        let total = self.jobs.len();
        let fraction = if total == 0 {
            1.0
        } else {
            self.finished as f64 / total as f64
        };
        self.emit(Event::RunProgress {
            finished: self.finished,
            total,
            fraction,
        });
    }

    fn transition(&mut self, id: JobId, next: Status, error: Option<TransferError>) -> bool {
        let Some(pos) = self.position(id) else {
            tracing::warn!(job = %id, "Transition for unknown job ignored");
            return false;
        };
        let state = &mut self.states[pos];

        if !state.status.can_transition_to(next) {
            tracing::debug!(job = %id, from = %state.status, to = %next, "Illegal transition ignored");
            return false;
        }

        state.status = next;
        state.error = error;
        if next.is_terminal() {
            self.finished += 1;
        }

        let reason = state.error.as_ref().map(|e| e.to_string());
        self.emit(Event::JobStateChanged {
            id,
            file_name: self.jobs[pos].file_name.clone(),
            status: next,
            reason,
        });
        self.emit_run_progress();
        true
    }
}

/// Shared handle to the run table
#[derive(Clone)]
pub(crate) struct SharedTable(Arc<Mutex<RunTable>>);

impl SharedTable {
    pub(crate) fn new(
        jobs: Vec<Job>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
        run_tx: tokio::sync::mpsc::UnboundedSender<Event>,
    ) -> Self {
        let states = jobs.iter().map(|_| JobState::queued()).collect();
        let positions = jobs.iter().enumerate().map(|(pos, job)| (job.id, pos)).collect();
        Self(Arc::new(Mutex::new(RunTable {
            jobs,
            states,
            positions,
            finished: 0,
            event_tx,
            run_tx: Some(run_tx),
        })))
    }

    fn lock(&self) -> MutexGuard<'_, RunTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_in_progress(&self, id: JobId) -> bool {
        self.lock().transition(id, Status::InProgress, None)
    }

    pub(crate) fn mark_skipped(&self, id: JobId) -> bool {
        self.lock().transition(id, Status::Skipped, None)
    }

    /// Record a transfer's outcome
    pub(crate) fn finish(&self, id: JobId, outcome: Outcome) {
        let mut table = self.lock();
        match outcome {
            Outcome::Succeeded { bytes } => {
                if let Some(pos) = table.position(id) {
                    let state = &mut table.states[pos];
                    state.bytes_transferred = bytes;
                    state.bytes_expected.get_or_insert(bytes);
                }
                table.transition(id, Status::Succeeded, None);
            }
            Outcome::Failed(error) => {
                table.transition(id, Status::Failed, Some(error));
            }
            Outcome::Cancelled => {
                table.transition(id, Status::Cancelled, None);
            }
        }
    }

    /// Update byte counters of an in-progress job; counts never move backwards
    pub(crate) fn progress(&self, id: JobId, bytes_transferred: u64, bytes_expected: Option<u64>) {
        let mut table = self.lock();
        let Some(pos) = table.position(id) else {
            return;
        };
        let state = &mut table.states[pos];
        if state.status != Status::InProgress || bytes_transferred < state.bytes_transferred {
            return;
        }

        let before = state.bytes_transferred;
        let old_fraction = state.progress_fraction();
        state.bytes_transferred = bytes_transferred;
        if bytes_expected.is_some() {
            state.bytes_expected = bytes_expected;
        }
        let fraction = state.progress_fraction();

        let worth_reporting = match (old_fraction, fraction) {
            (_, Some(new)) => {
                old_fraction.is_none_or(|old| (new * 100.0).floor() > (old * 100.0).floor())
            }
            (_, None) => {
                before / INDETERMINATE_PROGRESS_STEP
                    != bytes_transferred / INDETERMINATE_PROGRESS_STEP
            }
        };

        if worth_reporting {
            let event = Event::JobProgress {
                id,
                bytes_transferred,
                bytes_expected: state.bytes_expected,
                fraction,
            };
            table.emit(event);
        }
    }

    /// Jobs still `InProgress` after every worker returned had their worker die
    pub(crate) fn fail_orphans(&self) {
        let mut table = self.lock();
        let orphans: Vec<JobId> = table
            .jobs
            .iter()
            .zip(&table.states)
            .filter(|(_, s)| s.status == Status::InProgress)
            .map(|(job, _)| job.id)
            .collect();

        for id in orphans {
            tracing::error!(job = %id, "Download worker ended without reporting an outcome");
            table.transition(
                id,
                Status::Failed,
                Some(TransferError::LocalIoFailure(
                    "download worker ended unexpectedly".to_string(),
                )),
            );
        }
    }

    /// Jobs never dispatched end the run as cancelled
    pub(crate) fn cancel_unstarted(&self) -> usize {
        let mut table = self.lock();
        let queued: Vec<JobId> = table
            .jobs
            .iter()
            .zip(&table.states)
            .filter(|(_, s)| s.status == Status::Queued)
            .map(|(job, _)| job.id)
            .collect();

        for id in &queued {
            table.transition(*id, Status::Cancelled, None);
        }
        queued.len()
    }

    pub(crate) fn states(&self) -> Vec<JobState> {
        self.lock().states.clone()
    }

    pub(crate) fn summarize(&self) -> RunSummary {
        let table = self.lock();
        reporter::summarize(table.jobs.iter().zip(table.states.iter()))
    }

    pub(crate) fn emit_finished(&self, summary: &RunSummary) {
        let mut table = self.lock();
        table.emit(Event::RunFinished {
            total: summary.total,
            succeeded: summary.succeeded,
            skipped: summary.skipped,
            failed: summary.failed,
            cancelled: summary.cancelled,
        });
        table.run_tx = None;
    }
}
