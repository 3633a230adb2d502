//! Configuration types for clip-archive-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Lowest accepted pool size
pub const MIN_CONCURRENT_DOWNLOADS: usize = 1;
/// Highest accepted pool size
pub const MAX_CONCURRENT_DOWNLOADS: usize = 16;

/// How jobs whose timestamps produce the same file name are handled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateTimestampAction {
    /// Append " (1)", " (2)", ... to later duplicates (in planned order)
    #[default]
    Rename,
    /// Fail planning with a duplicate-destination error
    Error,
}

/// Download behavior configuration (destination, concurrency, HTTP client)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output directory (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum concurrent transfers, 1 to 16 (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Skip jobs whose destination file already exists (default: true)
    #[serde(default = "default_true")]
    pub skip_existing: bool,

    /// Bytes written to disk per chunk (default: 4096)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Time allowed for the response head to arrive (default: 300s)
    ///
    /// The body has no overall deadline, so a large video on a slow link is
    /// never cut off while data keeps flowing.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Longest gap between two body reads before the transfer fails (default: 60s)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Duration,

    /// Connect timeout (default: 30s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Handling of jobs that share a timestamp
    #[serde(default)]
    pub duplicate_timestamps: DuplicateTimestampAction,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            skip_existing: true,
            chunk_size: default_chunk_size(),
            request_timeout: default_request_timeout(),
            idle_timeout: default_idle_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            duplicate_timestamps: DuplicateTimestampAction::default(),
        }
    }
}

/// Main configuration for [`ArchiveDownloader`](crate::ArchiveDownloader)
///
/// Sub-config fields are flattened, so the serialized form has no nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,
}

impl Config {
    /// Output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Check that every setting is within its accepted range
    pub fn validate(&self) -> Result<()> {
        let parallelism = self.download.max_concurrent_downloads;
        if !(MIN_CONCURRENT_DOWNLOADS..=MAX_CONCURRENT_DOWNLOADS).contains(&parallelism) {
            return Err(Error::Config {
                message: format!(
                    "max_concurrent_downloads must be between {} and {}, got {}",
                    MIN_CONCURRENT_DOWNLOADS, MAX_CONCURRENT_DOWNLOADS, parallelism
                ),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }

        if self.download.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk_size must be at least 1 byte".to_string(),
                key: Some("chunk_size".to_string()),
            });
        }

        for (key, timeout) in [
            ("request_timeout", self.download.request_timeout),
            ("idle_timeout", self.download.idle_timeout),
            ("connect_timeout", self.download.connect_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::Config {
                    message: format!("{key} must be greater than zero"),
                    key: Some(key.to_string()),
                });
            }
        }

        if self.download.output_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "output_dir must not be empty".to_string(),
                key: Some("output_dir".to_string()),
            });
        }

        Ok(())
    }
}

/// Clamp a requested pool size into the accepted range
pub fn clamp_parallelism(requested: usize) -> usize {
    requested.clamp(MIN_CONCURRENT_DOWNLOADS, MAX_CONCURRENT_DOWNLOADS)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    4096
}

pub(crate) fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

pub(crate) fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("clip-archive-dl/{}", env!("CARGO_PKG_VERSION"))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download.max_concurrent_downloads, 4);
        assert_eq!(config.download.chunk_size, 4096);
        assert!(config.download.skip_existing);
        assert_eq!(
            config.download.duplicate_timestamps,
            DuplicateTimestampAction::Rename
        );
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.output_dir(), &PathBuf::from("./downloads"));
        assert_eq!(config.download.max_concurrent_downloads, 4);
    }

    #[test]
    fn json_fields_are_flattened() {
        let config: Config = serde_json::from_str(
            r#"{"output_dir": "/tmp/clips", "max_concurrent_downloads": 8, "duplicate_timestamps": "error"}"#,
        )
        .unwrap();
        assert_eq!(config.output_dir(), &PathBuf::from("/tmp/clips"));
        assert_eq!(config.download.max_concurrent_downloads, 8);
        assert_eq!(
            config.download.duplicate_timestamps,
            DuplicateTimestampAction::Error
        );

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("download").is_none());
        assert_eq!(json["max_concurrent_downloads"], 8);
    }

    #[test]
    fn parallelism_out_of_range_is_rejected() {
        for bad in [0, 17, 100] {
            let mut config = Config::default();
            config.download.max_concurrent_downloads = bad;
            match config.validate() {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some("max_concurrent_downloads"))
                }
                other => panic!("expected config error for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = Config::default();
        config.download.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(ref k), .. }) if k == "chunk_size"
        ));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut config = Config::default();
        config.download.idle_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(ref k), .. }) if k == "idle_timeout"
        ));

        let mut config = Config::default();
        config.download.request_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(ref k), .. }) if k == "request_timeout"
        ));
    }

    #[test]
    fn timeouts_default_to_head_and_idle_limits() {
        let config = Config::default();
        assert_eq!(config.download.request_timeout, Duration::from_secs(300));
        assert_eq!(config.download.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn clamp_parallelism_bounds() {
        assert_eq!(clamp_parallelism(0), 1);
        assert_eq!(clamp_parallelism(7), 7);
        assert_eq!(clamp_parallelism(64), 16);
    }
}
