//! Error types for clip-archive-dl
//!
//! Errors fall into two tiers:
//! - Run-level errors ([`Error`], [`ParseError`], [`PlanError`]) abort before any
//!   network activity and are returned synchronously to the caller
//! - Job-level errors ([`TransferError`]) are captured in that job's state and in
//!   the [`RunSummary`](crate::reporter::RunSummary); they never cross job boundaries

use thiserror::Error;

/// Result type alias for clip-archive-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for clip-archive-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// The manifest could not be turned into job descriptors
    #[error("manifest error: {0}")]
    Parse(#[from] ParseError),

    /// Job planning failed
    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (HTTP client construction)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run's coordinating task terminated without producing a summary
    #[error("run aborted: {0}")]
    RunAborted(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Manifest parsing errors
///
/// All variants are fatal to the whole run: no jobs are planned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The manifest could not be read (missing file, permissions, invalid UTF-8)
    #[error("manifest is unreadable: {0}")]
    Unreadable(String),

    /// A JSON manifest could not be decoded into the expected shape
    #[error("manifest is malformed: {0}")]
    Malformed(String),

    /// The requested manifest kind is not supported
    #[error("unsupported manifest kind: {0}")]
    UnsupportedKind(String),
}

/// Planning errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Two jobs resolve to the same destination file name
    #[error("duplicate destination file name: {file_name}")]
    DuplicateDestination {
        /// The file name shared by more than one job
        file_name: String,
    },
}

/// Per-job transfer errors
///
/// Stored in job state and in the run summary, so it is cheap to clone.
/// The `Display` output is the human-readable reason shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Connection, TLS, timeout or body-stream failure
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The server answered with a non-2xx status
    #[error("HTTP status {}", describe_status(.0))]
    NonSuccessStatus(u16),

    /// Writing, renaming or creating local files failed
    #[error("local I/O failure: {0}")]
    LocalIoFailure(String),
}

impl TransferError {
    /// HTTP status code carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransferError::NonSuccessStatus(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if !status.is_success() => TransferError::NonSuccessStatus(status.as_u16()),
            _ => TransferError::NetworkFailure(err.to_string()),
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::LocalIoFailure(err.to_string())
    }
}

fn describe_status(code: &u16) -> String {
    match reqwest::StatusCode::from_u16(*code)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("{code} {reason}"),
        None => code.to_string(),
    }
}
