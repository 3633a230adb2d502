//! Outcome reporting: fold final job states into a run summary.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::planner::Job;
use crate::scheduler::JobState;
use crate::types::{JobId, Status};

/// A job that ended in `Failed`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    /// Job ID
    pub id: JobId,
    /// Destination file name
    pub file_name: String,
    /// Destination path
    pub destination: PathBuf,
    /// Source URL
    pub source_url: String,
    /// Human-readable failure reason
    pub reason: String,
    /// HTTP status, when the server refused the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Final counts of a run
///
/// `succeeded + skipped + failed + cancelled == total` always holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Jobs in the run
    pub total: usize,
    /// Jobs downloaded
    pub succeeded: usize,
    /// Jobs skipped because their destination existed
    pub skipped: usize,
    /// Jobs that failed
    pub failed: usize,
    /// Jobs cancelled, including those never dispatched
    pub cancelled: usize,
    /// Failed jobs in planned order
    pub failures: Vec<FailedJob>,
}

impl RunSummary {
    /// No failures and nothing cancelled
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed, {} cancelled ({} total)",
            self.succeeded, self.skipped, self.failed, self.cancelled, self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.file_name, failure.reason)?;
        }
        Ok(())
    }
}

/// Summarize final job states
///
/// Pure aggregation. A job still `Queued` or `InProgress` is counted as
/// cancelled, so the counts are exhaustive even for a summary taken early.
pub fn summarize<'a>(entries: impl IntoIterator<Item = (&'a Job, &'a JobState)>) -> RunSummary {
    let mut summary = RunSummary::default();

    for (job, state) in entries {
        summary.total += 1;
        match state.status {
            Status::Succeeded => summary.succeeded += 1,
            Status::Skipped => summary.skipped += 1,
            Status::Failed => {
                summary.failed += 1;
                summary.failures.push(failed_job(job, state.error.as_ref()));
            }
            Status::Cancelled | Status::Queued | Status::InProgress => summary.cancelled += 1,
        }
    }

    summary
}

fn failed_job(job: &Job, error: Option<&TransferError>) -> FailedJob {
    FailedJob {
        id: job.id,
        file_name: job.file_name.clone(),
        destination: job.destination.clone(),
        source_url: job.source_url.to_string(),
        reason: error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string()),
        status_code: error.and_then(TransferError::status_code),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn job(index: usize) -> Job {
        let file_name = format!("2023-01-0{} 00-00-00.mp4", index + 1);
        Job {
            id: JobId(index),
            timestamp: format!("2023-01-0{} 00:00:00", index + 1),
            source_url: url::Url::parse(&format!("https://v.example.com/{index}")).unwrap(),
            destination: PathBuf::from("/out").join(&file_name),
            file_name,
            skip_existing: true,
        }
    }

    fn state(status: Status, error: Option<TransferError>) -> JobState {
        JobState {
            status,
            bytes_transferred: 0,
            bytes_expected: None,
            error,
        }
    }

    #[test]
    fn empty_run_is_all_zero() {
        let summary = summarize(std::iter::empty());
        assert_eq!(summary, RunSummary::default());
        assert!(summary.is_complete_success());
    }

    #[test]
    fn counts_are_exhaustive() {
        let jobs: Vec<Job> = (0..6).map(job).collect();
        let states = vec![
            state(Status::Succeeded, None),
            state(Status::Skipped, None),
            state(Status::Failed, Some(TransferError::NonSuccessStatus(404))),
            state(Status::Cancelled, None),
            state(Status::Queued, None),
            state(Status::Succeeded, None),
        ];

        let summary = summarize(jobs.iter().zip(states.iter()));

        assert_eq!(summary.total, 6);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 2);
        assert_eq!(
            summary.succeeded + summary.skipped + summary.failed + summary.cancelled,
            summary.total
        );
        assert!(!summary.is_complete_success());
    }

    #[test]
    fn failures_carry_file_name_and_reason() {
        let jobs: Vec<Job> = (0..2).map(job).collect();
        let states = vec![
            state(
                Status::Failed,
                Some(TransferError::NetworkFailure("connection reset".to_string())),
            ),
            state(Status::Failed, Some(TransferError::NonSuccessStatus(404))),
        ];

        let summary = summarize(jobs.iter().zip(states.iter()));

        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].file_name, "2023-01-01 00-00-00.mp4");
        assert_eq!(
            summary.failures[0].reason,
            "network failure: connection reset"
        );
        assert_eq!(summary.failures[1].status_code, Some(404));
        assert!(summary.failures[1].reason.contains("404"));
    }

    #[test]
    fn display_lists_failures() {
        let jobs = vec![job(0)];
        let states = vec![state(
            Status::Failed,
            Some(TransferError::NonSuccessStatus(500)),
        )];
        let text = summarize(jobs.iter().zip(states.iter())).to_string();
        assert!(text.starts_with("0 succeeded, 0 skipped, 1 failed, 0 cancelled (1 total)"));
        assert!(text.contains("2023-01-01 00-00-00.mp4: HTTP status 500 Internal Server Error"));
    }
}
