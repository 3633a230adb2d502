//! Core types for clip-archive-dl

use serde::{Deserialize, Serialize};

/// Identifier for a job within a run: its position in the planned order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub usize);

impl JobId {
    /// Get the inner index
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for JobId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job status
///
/// `Queued -> InProgress -> {Succeeded | Failed | Cancelled}`, with the
/// shortcut `Queued -> Skipped` when the destination already exists and
/// `Queued -> Cancelled` for jobs never dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting for a pool slot
    Queued,
    /// Transfer running
    InProgress,
    /// Downloaded and renamed into place
    Succeeded,
    /// Destination already existed; no network call was made
    ///
    /// A terminal success: the "succeeded (skipped)" outcome, reported apart
    /// from `Succeeded` so summaries can count it separately. See
    /// [`Status::is_success`].
    Skipped,
    /// Transfer failed
    Failed,
    /// Cancelled before or during the transfer
    Cancelled,
}

impl Status {
    /// Whether no further transitions can occur
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Queued | Status::InProgress)
    }

    /// Whether the job ended with its file in place (`Succeeded` or `Skipped`)
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Succeeded | Status::Skipped)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (Status::Queued, Status::InProgress)
            | (Status::Queued, Status::Skipped)
            | (Status::Queued, Status::Cancelled) => true,
            (Status::InProgress, next) => matches!(
                next,
                Status::Succeeded | Status::Failed | Status::Cancelled
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::InProgress => "in progress",
            Status::Succeeded => "succeeded",
            Status::Skipped => "skipped",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Event emitted during a run
///
/// Subscribe with [`ArchiveDownloader::subscribe`](crate::ArchiveDownloader::subscribe).
/// Events for one job are ordered; events across jobs are not.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job changed state
    JobStateChanged {
        /// Job ID
        id: JobId,
        /// Destination file name
        file_name: String,
        /// New status
        status: Status,
        /// Failure reason, present only for `Failed`
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Bytes were written for an in-progress job
    JobProgress {
        /// Job ID
        id: JobId,
        /// Bytes written so far
        bytes_transferred: u64,
        /// Declared content length, if the server sent one
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_expected: Option<u64>,
        /// Fraction in `[0.0, 1.0]`, absent while indeterminate
        #[serde(skip_serializing_if = "Option::is_none")]
        fraction: Option<f64>,
    },

    /// Aggregate progress after a job reached a terminal state
    RunProgress {
        /// Jobs in a terminal state
        finished: usize,
        /// Total jobs in the run
        total: usize,
        /// `finished / total`, 1.0 for an empty run
        fraction: f64,
    },

    /// The run has finished and every worker has returned
    RunFinished {
        /// Total jobs
        total: usize,
        /// Jobs downloaded
        succeeded: usize,
        /// Jobs skipped because their destination existed
        skipped: usize,
        /// Jobs that failed
        failed: usize,
        /// Jobs cancelled
        cancelled: usize,
    },
}

/// Compute a progress fraction, `None` when the total is unknown or zero
pub(crate) fn progress_fraction(done: u64, expected: Option<u64>) -> Option<f64> {
    match expected {
        Some(total) if total > 0 => Some((done as f64 / total as f64).min(1.0)),
        _ => None,
    }
}
