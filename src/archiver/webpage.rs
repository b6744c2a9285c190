use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use super::{download_name, Fetcher};
use crate::constants::{ARCHIVAL_USER_AGENT, DEFAULT_WEBPAGE_EXTENSION};

/// Saves a page's raw response body with a single GET request.
pub struct WebpageFetcher {
    http: reqwest::Client,
}

impl WebpageFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for WebpageFetcher {
    fn name(&self) -> &'static str {
        "webpage"
    }

    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        debug!(url = %url, "Downloading webpage");

        let response = self
            .http
            .get(url)
            .header(USER_AGENT, ARCHIVAL_USER_AGENT)
            .send()
            .await
            .context("Failed to fetch URL")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP request failed with status {}", response.status());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let extension = extension_for_content_type(content_type.as_deref());

        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        let path = dest_dir.join(format!("{}.{extension}", download_name(url)));
        save_download(&path, &body).await?;

        Ok(path)
    }
}

/// Write `body` to `path` via a `.part` file that is removed if anything fails,
/// so a failed save never leaves a file behind in the download directory.
async fn save_download(path: &Path, body: &[u8]) -> Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let saved = write_then_rename(&partial, path, body).await;
    if saved.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            debug!(path = %partial.display(), "No partial download to remove: {e}");
        }
    }
    saved
}

async fn write_then_rename(partial: &Path, path: &Path, body: &[u8]) -> Result<()> {
    tokio::fs::write(partial, body)
        .await
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    tokio::fs::rename(partial, path)
        .await
        .with_context(|| format!("Failed to move download into {}", path.display()))
}

/// File extension for a declared content type, without the leading dot.
fn extension_for_content_type(content_type: Option<&str>) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let common = match essence.as_str() {
        "text/html" => Some("html"),
        "text/plain" => Some("txt"),
        "application/pdf" => Some("pdf"),
        "application/json" => Some("json"),
        "image/jpeg" => Some("jpg"),
        _ => None,
    };
    if let Some(ext) = common {
        return ext.to_string();
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map_or_else(|| DEFAULT_WEBPAGE_EXTENSION.to_string(), |ext| (*ext).to_string())
}
