use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{download_name, Fetcher};

/// Downloads media from video sites with `yt-dlp`.
pub struct VideoDownloader {
    program: String,
    max_height: u32,
    timeout: Duration,
}

impl VideoDownloader {
    #[must_use]
    pub fn new(program: impl Into<String>, max_height: u32, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            max_height,
            timeout,
        }
    }

    fn args(&self, url: &str, output_template: &Path) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            "--no-progress".to_string(),
            // Cap resolution to bound file size
            "--format".to_string(),
            format!("best[height<={}]", self.max_height),
            "--output".to_string(),
            output_template.to_string_lossy().to_string(),
            // Report where the finished file ended up
            "--print".to_string(),
            "after_move:filepath".to_string(),
            // URL goes last
            "--".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl Fetcher for VideoDownloader {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let stem = download_name(url);
        let output_template = dest_dir.join(format!("{stem}.%(ext)s"));
        let args = self.args(url, &output_template);

        debug!(url = %url, "Running yt-dlp");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .with_context(|| {
                format!(
                    "yt-dlp download timed out after {} seconds",
                    self.timeout.as_secs()
                )
            })?
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(printed) = stdout.lines().map(str::trim).rfind(|l| !l.is_empty()) {
            let path = PathBuf::from(printed);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(path);
            }
        }

        find_download(dest_dir, &stem)
            .await?
            .with_context(|| format!("yt-dlp reported success but no file named {stem}.* exists"))
    }
}

/// Find a finished download named `<stem>.<ext>` in `dir`.
async fn find_download(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    let prefix = format!("{stem}.");
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let partial = name.ends_with(".part") || name.ends_with(".ytdl");
        if name.starts_with(&prefix) && !partial && entry.file_type().await?.is_file() {
            return Ok(Some(entry.path()));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_cap_height_and_end_with_url() {
        let downloader = VideoDownloader::new("yt-dlp", 480, Duration::from_secs(10));
        let args = downloader.args("https://youtu.be/abc", Path::new("downloads/x.%(ext)s"));

        let format_pos = args.iter().position(|a| a == "--format").unwrap();
        assert_eq!(args[format_pos + 1], "best[height<=480]");
        let output_pos = args.iter().position(|a| a == "--output").unwrap();
        assert_eq!(args[output_pos + 1], "downloads/x.%(ext)s");
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_find_download_skips_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("abc.mp4.part"), "x").await.unwrap();
        tokio::fs::write(dir.path().join("other.mp4"), "x").await.unwrap();
        assert!(find_download(dir.path(), "abc").await.unwrap().is_none());

        tokio::fs::write(dir.path().join("abc.webm"), "x").await.unwrap();
        assert_eq!(
            find_download(dir.path(), "abc").await.unwrap(),
            Some(dir.path().join("abc.webm"))
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = VideoDownloader::new(
            "definitely-not-yt-dlp",
            720,
            Duration::from_secs(10),
        );
        assert!(downloader
            .fetch("https://youtu.be/abc", dir.path())
            .await
            .is_err());
    }
}
