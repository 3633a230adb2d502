//! Manifest fixtures and mock video hosts

use std::path::Path;

use clip_archive_dl::{ArchiveDownloader, Config};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Body served for every mock video
pub fn video_body(index: usize) -> Vec<u8> {
    format!("video-{index}-").repeat(2048).into_bytes()
}

/// Line-format manifest listing `count` videos on `base_url`, oldest first
pub fn line_manifest(base_url: &str, count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "Date: 2023-04-{:02} 12:00:00\nLink: {}/v/{}.mp4\nLikes: {}\n\n",
                i + 1,
                base_url,
                i,
                i * 10
            )
        })
        .collect()
}

/// JSON export listing `count` videos on `base_url`
pub fn json_manifest(base_url: &str, count: usize) -> String {
    let entries: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "Date": format!("2023-04-{:02} 12:00:00", i + 1),
                "Link": format!("{base_url}/v/{i}.mp4"),
                "Likes": (i * 10).to_string(),
            })
        })
        .collect();
    serde_json::json!({
        "Profile": {"Profile Information": {}},
        "Video": {"Videos": {"VideoList": entries}}
    })
    .to_string()
}

/// Serve `/v/{i}.mp4` for every index, with `missing` answering 404
pub async fn mount_videos(server: &MockServer, count: usize, missing: &[usize]) {
    for i in 0..count {
        let template = if missing.contains(&i) {
            ResponseTemplate::new(404)
        } else {
            ResponseTemplate::new(200).set_body_bytes(video_body(i))
        };
        Mock::given(method("GET"))
            .and(path(format!("/v/{i}.mp4")))
            .respond_with(template)
            .mount(server)
            .await;
    }
}

/// Downloader writing into a fresh temp directory
pub async fn create_downloader(
    customize: impl FnOnce(&mut Config),
) -> (ArchiveDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("videos");
    customize(&mut config);

    let downloader = ArchiveDownloader::new(config)
        .await
        .expect("downloader should build");
    (downloader, temp_dir)
}

/// Write `content` to `name` inside `dir`
pub fn write_manifest(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("manifest written");
    path
}
