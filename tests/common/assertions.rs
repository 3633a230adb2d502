//! Custom assertions for integration tests

use std::path::Path;

use clip_archive_dl::RunSummary;

/// Every job is accounted for exactly once
pub fn assert_summary_exhaustive(summary: &RunSummary) {
    assert_eq!(
        summary.succeeded + summary.skipped + summary.failed + summary.cancelled,
        summary.total,
        "summary counts must sum to total: {summary:?}"
    );
}

/// No `.temp` file is left in `dir`
pub fn assert_no_temp_files(dir: &Path) {
    let leftovers: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".temp"))
                .collect()
        })
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

/// Names of the `.mp4` files in `dir`, sorted
pub fn downloaded_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".mp4"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
