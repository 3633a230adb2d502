//! # clip-archive-dl
//!
//! Backend library for downloading the videos listed in an account data export.
//!
//! ## Design Philosophy
//!
//! clip-archive-dl is designed to be:
//! - **Library-first** - No UI; front ends supply parameters and render events
//! - **Bounded** - A fixed pool of transfers with back-pressure on dispatch
//! - **Tolerant** - One failed video never aborts its siblings
//! - **Cancellable** - One cancellation token per run, observed by every transfer
//!
//! ## Quick Start
//!
//! ```no_run
//! use clip_archive_dl::{ArchiveDownloader, Config, ManifestKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.output_dir = "./videos".into();
//!
//!     let downloader = ArchiveDownloader::new(config).await?;
//!
//!     // Subscribe to events before starting
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let manifest = std::fs::read("user_data.json")?;
//!     let jobs = downloader.plan_jobs(&manifest, ManifestKind::Json)?;
//!     let handle = downloader.start_run(jobs, 4);
//!     let summary = handle.wait().await?;
//!     println!("{summary}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Downloader facade
pub mod downloader;
/// Error types
pub mod error;
/// Manifest parsing
pub mod manifest;
/// Job planning
pub mod planner;
/// Run summaries
pub mod reporter;
/// Bounded worker pool and run handles
pub mod scheduler;
/// Single-job HTTP transfers
pub mod transfer;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, DuplicateTimestampAction};
pub use downloader::ArchiveDownloader;
pub use error::{Error, ParseError, PlanError, Result, TransferError};
pub use manifest::{JobDescriptor, ManifestKind};
pub use planner::{Job, plan_jobs};
pub use reporter::{FailedJob, RunSummary};
pub use scheduler::{JobState, RunHandle, Scheduler};
pub use transfer::{HttpTransfer, Outcome, Transfer};
pub use types::{Event, JobId, Status};

/// Wait for a run to finish, cancelling it on a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// After a signal the run is cancelled and still awaited, so the returned
/// summary accounts for every job and no temp files remain.
///
/// # Example
///
/// ```no_run
/// use clip_archive_dl::{ArchiveDownloader, Config, ManifestKind, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = ArchiveDownloader::new(Config::default()).await?;
///     let jobs = downloader
///         .plan_file("posts.txt".as_ref(), ManifestKind::Line)
///         .await?;
///
///     let summary = run_until_signal(downloader.start(jobs)).await?;
///     println!("{summary}");
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(handle: RunHandle) -> Result<RunSummary> {
    let token = handle.cancellation_token();
    let signal_watch = tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("Termination signal received, cancelling run");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });

    let result = handle.wait().await;
    signal_watch.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal");
                }
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Failed to register SIGINT handler, using SIGTERM only");
            sigterm.recv().await;
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM handler, using SIGINT only");
            sigint.recv().await;
        }
        (Err(e1), Err(e2)) => {
            tracing::error!(
                sigterm_error = %e1,
                sigint_error = %e2,
                "Failed to register any signal handlers, falling back to ctrl_c"
            );
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl_c handler failed, waiting indefinitely");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C, waiting indefinitely");
        std::future::pending::<()>().await;
    }
}
