//! `ArchiveDownloader`: the entry point front ends embed.

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::{self, ManifestKind};
use crate::planner::{self, Job};
use crate::reporter::RunSummary;
use crate::scheduler::{RunHandle, Scheduler};
use crate::transfer::{HttpTransfer, Transfer};
use crate::types::Event;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ArchiveDownloader {
    config: Arc<Config>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    scheduler: Scheduler,
}

impl ArchiveDownloader {
    /// Create a downloader using the HTTP transfer
    ///
    /// Validates the configuration, creates the output directory and
    /// builds the shared HTTP client.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transfer = HttpTransfer::new(&config.download)?;
        Self::with_transfer(config, Arc::new(transfer)).await
    }

    /// Create a downloader with a custom transfer implementation
    pub async fn with_transfer(config: Config, transfer: Arc<dyn Transfer>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.output_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        config.download.output_dir.display(),
                        e
                    ),
                ))
            })?;

        // Multiple subscribers receive every event independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let scheduler = Scheduler::new(transfer, event_tx.clone());

        Ok(Self {
            config: Arc::new(config),
            event_tx,
            scheduler,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to run events
    ///
    /// Only events sent after subscribing are received, so subscribe
    /// before calling [`start_run`](Self::start_run).
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Parse manifest bytes and plan jobs into the configured output directory
    pub fn plan_jobs(&self, content: &[u8], kind: ManifestKind) -> Result<Vec<Job>> {
        let descriptors = manifest::parse(content, kind)?;
        let download = &self.config.download;
        Ok(planner::plan(
            descriptors,
            &download.output_dir,
            download.skip_existing,
            download.duplicate_timestamps,
        )?)
    }

    /// Read a manifest file and plan its jobs
    pub async fn plan_file(&self, path: &Path, kind: ManifestKind) -> Result<Vec<Job>> {
        let descriptors = manifest::parse_file(path, kind).await?;
        let download = &self.config.download;
        Ok(planner::plan(
            descriptors,
            &download.output_dir,
            download.skip_existing,
            download.duplicate_timestamps,
        )?)
    }

    /// Start downloading `jobs` with `parallelism` concurrent transfers (clamped to 1..=16)
    pub fn start_run(&self, jobs: Vec<Job>, parallelism: usize) -> RunHandle {
        self.scheduler.start(jobs, parallelism)
    }

    /// Start downloading `jobs` with the configured parallelism
    pub fn start(&self, jobs: Vec<Job>) -> RunHandle {
        self.start_run(jobs, self.config.download.max_concurrent_downloads)
    }

    /// Plan a manifest file and download it to completion
    pub async fn download_manifest(&self, path: &Path, kind: ManifestKind) -> Result<RunSummary> {
        let jobs = self.plan_file(path, kind).await?;
        self.start(jobs).wait().await
    }
}
