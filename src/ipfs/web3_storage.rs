use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use super::{UploadMetadata, Uploader};
use crate::config::Secret;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    cid: String,
}

/// Client for the Web3.Storage upload API, authenticated with a bearer token.
pub struct Web3StorageClient {
    http: reqwest::Client,
    api_url: String,
    token: Secret,
}

impl Web3StorageClient {
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: &str, token: Secret) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl Uploader for Web3StorageClient {
    fn name(&self) -> &'static str {
        "web3.storage"
    }

    async fn upload(&self, path: &Path, metadata: &UploadMetadata) -> Result<String> {
        let file_bytes = tokio::fs::read(path)
            .await
            .context("Failed to read file for Web3.Storage upload")?;

        let part = multipart::Part::bytes(file_bytes).file_name(metadata.name.clone());
        let form = multipart::Form::new().part("file", part);

        let url = format!("{}/upload", self.api_url);
        debug!(url = %url, file = %path.display(), "Uploading file to Web3.Storage");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token.expose())
            .multipart(form)
            .send()
            .await
            .context("Failed to send request to Web3.Storage")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            anyhow::bail!("Web3.Storage upload failed: {} - {}", status, body);
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .context("Failed to parse Web3.Storage response")?;

        Ok(uploaded.cid)
    }
}
