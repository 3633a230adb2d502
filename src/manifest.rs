//! Manifest parsing: turn an export file into ordered job descriptors.
//!
//! Two formats are understood:
//! - line format: `Date: <timestamp>` / `Link: <url>` records, one field per line
//! - JSON format: `{"Video": {"Videos": {"VideoList": [{"Date", "Link", "Likes"}]}}}`
//!
//! Output order is the order records appear in the source. Sorting is the
//! planner's job.

use crate::error::ParseError;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

const DATE_TAG: &str = "Date:";
const LINK_TAG: &str = "Link:";

/// Timestamp layouts accepted for ordering, most common first
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Manifest file format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestKind {
    /// Alternating `Date:` / `Link:` lines
    Line,
    /// Structured JSON export
    Json,
}

impl ManifestKind {
    /// Infer the kind from a file extension (`.json` is JSON, anything else is line format)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ManifestKind::Json,
            _ => ManifestKind::Line,
        }
    }
}

impl FromStr for ManifestKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" | "txt" | "text" => Ok(ManifestKind::Line),
            "json" => Ok(ManifestKind::Json),
            other => Err(ParseError::UnsupportedKind(other.to_string())),
        }
    }
}

/// One valid manifest record: a timestamp and a source URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Timestamp exactly as it appeared in the manifest (trimmed)
    pub timestamp: String,
    /// Timestamp parsed to second precision, if it matched a known layout
    pub recorded_at: Option<NaiveDateTime>,
    /// Source URL of the media item
    pub source_url: url::Url,
}

impl JobDescriptor {
    /// Build a descriptor from raw field values, `None` if either is unusable
    pub fn from_fields(timestamp: &str, link: &str) -> Option<Self> {
        let timestamp = timestamp.trim();
        let link = link.trim();
        if timestamp.is_empty() || link.is_empty() {
            return None;
        }

        let source_url = match url::Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(link, error = %e, "Dropping manifest record with invalid link");
                return None;
            }
        };

        Some(Self {
            timestamp: timestamp.to_string(),
            recorded_at: parse_timestamp(timestamp),
            source_url,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse manifest content into descriptors
///
/// # Errors
///
/// - [`ParseError::Unreadable`] if the content is not valid UTF-8
/// - [`ParseError::Malformed`] if JSON content does not decode into the export shape
pub fn parse(content: &[u8], kind: ManifestKind) -> Result<Vec<JobDescriptor>, ParseError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| ParseError::Unreadable(format!("manifest is not valid UTF-8: {e}")))?;

    let descriptors = match kind {
        ManifestKind::Line => parse_lines(text),
        ManifestKind::Json => parse_json(text)?,
    };

    tracing::debug!(
        kind = ?kind,
        records = descriptors.len(),
        "Parsed manifest"
    );

    Ok(descriptors)
}

/// Read and parse a manifest file
pub async fn parse_file(path: &Path, kind: ManifestKind) -> Result<Vec<JobDescriptor>, ParseError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ParseError::Unreadable(format!("{}: {}", path.display(), e)))?;
    parse(&content, kind)
}

/// A `Date:` line opens a record and the next `Date:` (or the end) closes it.
/// The last `Link:` seen while the record is open wins.
fn parse_lines(text: &str) -> Vec<JobDescriptor> {
    let mut descriptors = Vec::new();
    let mut open: Option<(&str, Option<&str>)> = None;

    for line in text.split(['\n', '\r']) {
        let line = line.trim();

        if let Some(value) = line.strip_prefix(DATE_TAG) {
            close_record(open.take(), &mut descriptors);
            let value = value.trim();
            if !value.is_empty() {
                open = Some((value, None));
            }
        } else if let Some(value) = line.strip_prefix(LINK_TAG) {
            if let Some((_, link)) = open.as_mut() {
                *link = Some(value.trim());
            }
        }
    }
    close_record(open, &mut descriptors);

    descriptors
}

fn close_record(record: Option<(&str, Option<&str>)>, descriptors: &mut Vec<JobDescriptor>) {
    match record {
        Some((timestamp, Some(link))) => {
            if let Some(descriptor) = JobDescriptor::from_fields(timestamp, link) {
                descriptors.push(descriptor);
            }
        }
        Some((timestamp, None)) => {
            tracing::debug!(timestamp, "Discarding Date record without a Link");
        }
        None => {}
    }
}

#[derive(Deserialize)]
struct Export {
    #[serde(rename = "Video")]
    video: VideoSection,
}

#[derive(Deserialize)]
struct VideoSection {
    #[serde(rename = "Videos")]
    videos: VideoCollection,
}

#[derive(Deserialize)]
struct VideoCollection {
    // Absent and null both mean an account with no videos
    #[serde(rename = "VideoList", default)]
    video_list: Option<Vec<VideoRecord>>,
}

/// `Likes` and any other fields are ignored
#[derive(Deserialize)]
struct VideoRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Link")]
    link: String,
}

fn parse_json(text: &str) -> Result<Vec<JobDescriptor>, ParseError> {
    let export: Export =
        serde_json::from_str(text).map_err(|e| ParseError::Malformed(e.to_string()))?;

    Ok(export
        .video
        .videos
        .video_list
        .unwrap_or_default()
        .iter()
        .filter_map(|record| JobDescriptor::from_fields(&record.date, &record.link))
        .collect())
}
