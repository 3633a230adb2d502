//! Transfer executor: one HTTP GET streamed to a temp file, renamed into place on success.

use crate::config::{DownloadConfig, default_idle_timeout, default_request_timeout};
use crate::error::{Result, TransferError};
use crate::planner::Job;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Progress callback: `(bytes_transferred, bytes_expected)`
///
/// `bytes_expected` is `None` while the total is unknown.
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// Terminal result of one transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// File written and renamed to its destination
    Succeeded {
        /// Bytes written
        bytes: u64,
    },
    /// Transfer failed; no file was left behind
    Failed(TransferError),
    /// Cancellation was observed; the temp file was removed
    Cancelled,
}

/// Abstraction over a single-job transfer, enabling testability.
///
/// Implementations must leave no `.temp` file behind once `execute` returns
/// and must not retry.
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    /// Download `job` to its destination, reporting progress and honoring `cancel`
    async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        on_progress: &ProgressFn<'_>,
    ) -> Outcome;
}

/// Production [`Transfer`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpTransfer {
    client: reqwest::Client,
    chunk_size: usize,
    request_timeout: Duration,
    idle_timeout: Duration,
}

impl HttpTransfer {
    /// Build a client from the download settings
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self::with_client(client, config.chunk_size)
            .with_timeouts(config.request_timeout, config.idle_timeout))
    }

    /// Use an existing client with the default timeouts
    pub fn with_client(client: reqwest::Client, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
            request_timeout: default_request_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }

    /// Set the response-head timeout and the idle timeout between body reads
    pub fn with_timeouts(mut self, request_timeout: Duration, idle_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.idle_timeout = idle_timeout;
        self
    }

    /// Stream the body into `temp`. `Ok(None)` means cancellation was observed.
    ///
    /// Only the response head and each gap between reads are time-limited,
    /// not the body as a whole.
    async fn fetch_to_temp(
        &self,
        job: &Job,
        temp: &Path,
        cancel: &CancellationToken,
        on_progress: &ProgressFn<'_>,
    ) -> std::result::Result<Option<u64>, TransferError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            response = tokio::time::timeout(
                self.request_timeout,
                self.client.get(job.source_url.clone()).send(),
            ) => match response {
                Ok(response) => response?,
                Err(_) => {
                    return Err(TransferError::NetworkFailure(format!(
                        "no response within {}s",
                        self.request_timeout.as_secs_f64()
                    )));
                }
            },
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::NonSuccessStatus(status.as_u16()));
        }

        let expected = response.content_length();

        if let Some(parent) = job.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(temp).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                next = tokio::time::timeout(self.idle_timeout, stream.next()) => next,
            };

            let bytes = match next {
                Err(_) => {
                    return Err(TransferError::NetworkFailure(format!(
                        "no data received for {}s",
                        self.idle_timeout.as_secs_f64()
                    )));
                }
                Ok(Some(Ok(bytes))) => bytes,
                Ok(Some(Err(e))) => return Err(TransferError::NetworkFailure(e.to_string())),
                Ok(None) => break,
            };

            for piece in bytes.chunks(self.chunk_size) {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                file.write_all(piece).await?;
                written += piece.len() as u64;
                on_progress(written, expected);
            }
        }

        file.flush().await?;
        drop(file);

        if expected.is_none() {
            on_progress(written, Some(written));
        }

        Ok(Some(written))
    }
}

#[async_trait::async_trait]
impl Transfer for HttpTransfer {
    async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        on_progress: &ProgressFn<'_>,
    ) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Cancelled;
        }

        let temp = job.temp_path();
        let outcome = match self.fetch_to_temp(job, &temp, cancel, on_progress).await {
            Ok(Some(bytes)) => match tokio::fs::rename(&temp, &job.destination).await {
                Ok(()) => Outcome::Succeeded { bytes },
                Err(e) => Outcome::Failed(TransferError::LocalIoFailure(format!(
                    "failed to move {} into place: {}",
                    temp.display(),
                    e
                ))),
            },
            Ok(None) => Outcome::Cancelled,
            Err(e) => Outcome::Failed(e),
        };

        if !matches!(outcome, Outcome::Succeeded { .. }) {
            remove_temp(&temp).await;
        }

        outcome
    }
}

async fn remove_temp(temp: &Path) {
    match tokio::fs::remove_file(temp).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %temp.display(), error = %e, "Failed to remove temp file");
        }
    }
}
