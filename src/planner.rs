//! Job planning: order descriptors, derive destination paths, resolve name collisions.

use crate::config::DuplicateTimestampAction;
use crate::error::{PlanError, Result};
use crate::manifest::{self, JobDescriptor, ManifestKind};
use crate::types::JobId;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Extension given to every downloaded file
pub const MEDIA_EXTENSION: &str = "mp4";

/// Suffix of the in-progress sibling file
pub const TEMP_SUFFIX: &str = ".temp";

/// One planned download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Position in the planned (newest-first) order
    pub id: JobId,
    /// Timestamp as it appeared in the manifest
    pub timestamp: String,
    /// Source URL
    pub source_url: url::Url,
    /// Destination file name (no directory)
    pub file_name: String,
    /// Full destination path
    pub destination: PathBuf,
    /// Whether an existing destination file means the job is skipped
    pub skip_existing: bool,
}

impl Job {
    /// Path of the temporary file written while the transfer runs
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.destination.clone().into_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }
}

/// Destination file name for a timestamp: colons (and path separators) become `-`
pub fn file_name_for(timestamp: &str) -> String {
    let stem: String = timestamp
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' => '-',
            other => other,
        })
        .collect();
    format!("{stem}.{MEDIA_EXTENSION}")
}

/// Newest first; unparsed timestamps after parsed ones, by raw text descending.
fn newest_first(a: &JobDescriptor, b: &JobDescriptor) -> Ordering {
    match (a.recorded_at, b.recorded_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.timestamp.cmp(&a.timestamp),
    }
}

/// Turn descriptors into an ordered job list
///
/// Sorting is stable, so records with equal timestamps keep their manifest
/// order, and duplicate-name suffixes are assigned deterministically.
///
/// The existence check for `skip_existing` is not performed here; the
/// scheduler evaluates it when the job is dispatched.
pub fn plan(
    mut descriptors: Vec<JobDescriptor>,
    output_dir: &Path,
    skip_existing: bool,
    duplicates: DuplicateTimestampAction,
) -> std::result::Result<Vec<Job>, PlanError> {
    descriptors.sort_by(newest_first);

    let mut taken: HashSet<String> = HashSet::with_capacity(descriptors.len());
    let mut jobs = Vec::with_capacity(descriptors.len());

    for (index, descriptor) in descriptors.into_iter().enumerate() {
        let base_name = file_name_for(&descriptor.timestamp);
        let file_name = if taken.contains(&base_name) {
            match duplicates {
                DuplicateTimestampAction::Error => {
                    return Err(PlanError::DuplicateDestination {
                        file_name: base_name,
                    });
                }
                DuplicateTimestampAction::Rename => next_free_name(&base_name, &taken),
            }
        } else {
            base_name
        };
        taken.insert(file_name.clone());

        jobs.push(Job {
            id: JobId(index),
            timestamp: descriptor.timestamp,
            source_url: descriptor.source_url,
            destination: output_dir.join(&file_name),
            file_name,
            skip_existing,
        });
    }

    tracing::debug!(
        jobs = jobs.len(),
        output_dir = %output_dir.display(),
        skip_existing,
        "Planned jobs"
    );

    Ok(jobs)
}

/// `name.mp4` -> `name (1).mp4`, `name (2).mp4`, ... whichever is free first
fn next_free_name(base_name: &str, taken: &HashSet<String>) -> String {
    let stem = base_name
        .strip_suffix(&format!(".{MEDIA_EXTENSION}"))
        .unwrap_or(base_name);
    (1..)
        .map(|i| format!("{stem} ({i}).{MEDIA_EXTENSION}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base_name.to_string())
}

/// Parse manifest bytes and plan them in one step
///
/// Parse errors abort before any job is produced. Duplicate timestamps are
/// disambiguated with a numeric suffix.
pub fn plan_jobs(
    content: &[u8],
    kind: ManifestKind,
    output_dir: &Path,
    skip_existing: bool,
) -> Result<Vec<Job>> {
    let descriptors = manifest::parse(content, kind)?;
    Ok(plan(
        descriptors,
        output_dir,
        skip_existing,
        DuplicateTimestampAction::Rename,
    )?)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ParseError};

    fn descriptor(timestamp: &str, link: &str) -> JobDescriptor {
        JobDescriptor::from_fields(timestamp, link).unwrap()
    }

    fn plan_default(descriptors: Vec<JobDescriptor>) -> Vec<Job> {
        plan(
            descriptors,
            Path::new("/out"),
            true,
            DuplicateTimestampAction::Rename,
        )
        .unwrap()
    }

    #[test]
    fn file_name_replaces_colons() {
        assert_eq!(
            file_name_for("2023-01-02 10:11:12"),
            "2023-01-02 10-11-12.mp4"
        );
        assert_eq!(file_name_for("a/b\\c"), "a-b-c.mp4");
    }

    #[test]
    fn sorts_newest_first() {
        let jobs = plan_default(vec![
            descriptor("2023-01-01 00:00:00", "https://v.example.com/old"),
            descriptor("2023-03-01 00:00:00", "https://v.example.com/new"),
            descriptor("2023-02-01 00:00:00", "https://v.example.com/mid"),
        ]);

        let order: Vec<&str> = jobs.iter().map(|j| j.source_url.path()).collect();
        assert_eq!(order, vec!["/new", "/mid", "/old"]);
        let ids: Vec<usize> = jobs.iter().map(|j| j.id.get()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn equal_timestamps_keep_manifest_order() {
        let jobs = plan_default(vec![
            descriptor("2023-01-01 00:00:00", "https://v.example.com/first"),
            descriptor("2023-05-01 00:00:00", "https://v.example.com/newest"),
            descriptor("2023-01-01 00:00:00", "https://v.example.com/second"),
            descriptor("2023-01-01 00:00:00", "https://v.example.com/third"),
        ]);

        let order: Vec<&str> = jobs.iter().map(|j| j.source_url.path()).collect();
        assert_eq!(order, vec!["/newest", "/first", "/second", "/third"]);
    }

    #[test]
    fn unparsed_timestamps_sort_last() {
        let jobs = plan_default(vec![
            descriptor("unknown-b", "https://v.example.com/b"),
            descriptor("2020-01-01 00:00:00", "https://v.example.com/dated"),
            descriptor("unknown-c", "https://v.example.com/c"),
        ]);
        let order: Vec<&str> = jobs.iter().map(|j| j.source_url.path()).collect();
        assert_eq!(order, vec!["/dated", "/c", "/b"]);
    }

    #[test]
    fn destination_joins_output_dir() {
        let jobs = plan(
            vec![descriptor("2023-01-02 10:11:12", "https://v.example.com/a")],
            Path::new("/data/clips"),
            false,
            DuplicateTimestampAction::Rename,
        )
        .unwrap();

        assert_eq!(
            jobs[0].destination,
            PathBuf::from("/data/clips/2023-01-02 10-11-12.mp4")
        );
        assert_eq!(
            jobs[0].temp_path(),
            PathBuf::from("/data/clips/2023-01-02 10-11-12.mp4.temp")
        );
        assert!(!jobs[0].skip_existing);
    }

    #[test]
    fn duplicate_timestamps_get_suffixes() {
        let jobs = plan_default(vec![
            descriptor("2023-01-01 00:00:00", "https://v.example.com/1"),
            descriptor("2023-01-01 00:00:00", "https://v.example.com/2"),
            descriptor("2023-01-01 00:00:00", "https://v.example.com/3"),
        ]);

        let names: Vec<&str> = jobs.iter().map(|j| j.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "2023-01-01 00-00-00.mp4",
                "2023-01-01 00-00-00 (1).mp4",
                "2023-01-01 00-00-00 (2).mp4"
            ]
        );
    }

    #[test]
    fn duplicate_timestamps_can_be_rejected() {
        let result = plan(
            vec![
                descriptor("2023-01-01 00:00:00", "https://v.example.com/1"),
                descriptor("2023-01-01 00:00:00", "https://v.example.com/2"),
            ],
            Path::new("/out"),
            true,
            DuplicateTimestampAction::Error,
        );

        assert_eq!(
            result,
            Err(PlanError::DuplicateDestination {
                file_name: "2023-01-01 00-00-00.mp4".to_string()
            })
        );
    }

    #[test]
    fn empty_input_plans_nothing() {
        assert!(plan_default(vec![]).is_empty());
    }

    #[test]
    fn plan_jobs_parses_then_plans() {
        let content = b"Date: 2023-01-01 00:00:00\nLink: https://v.example.com/a\n\
                        Date: 2023-06-01 00:00:00\nLink: https://v.example.com/b\n";
        let jobs = plan_jobs(content, ManifestKind::Line, Path::new("/out"), true).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].file_name, "2023-06-01 00-00-00.mp4");
        assert!(jobs[0].skip_existing);
    }

    #[test]
    fn plan_jobs_surfaces_parse_errors() {
        let err = plan_jobs(b"{", ManifestKind::Json, Path::new("/out"), true).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Malformed(_))));
    }
}
