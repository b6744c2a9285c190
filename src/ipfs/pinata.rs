use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use super::{UploadMetadata, Uploader};
use crate::config::PinataCredentials;

/// Pinata response for a file pin.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResponse {
    ipfs_hash: String,
}

/// Client for the Pinata pinning API, authenticated with an API key pair.
pub struct PinataClient {
    http: reqwest::Client,
    api_url: String,
    credentials: PinataCredentials,
}

impl PinataClient {
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: &str, credentials: PinataCredentials) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }
}

#[async_trait]
impl Uploader for PinataClient {
    fn name(&self) -> &'static str {
        "pinata"
    }

    async fn upload(&self, path: &Path, metadata: &UploadMetadata) -> Result<String> {
        let file_bytes = tokio::fs::read(path)
            .await
            .context("Failed to read file for Pinata upload")?;

        let pin_metadata = serde_json::json!({
            "name": metadata.name,
            "keyvalues": { "original_url": metadata.original_url },
        });

        let part = multipart::Part::bytes(file_bytes).file_name(metadata.name.clone());
        let form = multipart::Form::new()
            .part("file", part)
            .text("pinataMetadata", pin_metadata.to_string());

        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        debug!(url = %url, file = %path.display(), "Pinning file to Pinata");

        let response = self
            .http
            .post(&url)
            .header("pinata_api_key", self.credentials.api_key.expose())
            .header("pinata_secret_api_key", self.credentials.secret_key.expose())
            .multipart(form)
            .send()
            .await
            .context("Failed to send request to Pinata")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            anyhow::bail!("Pinata upload failed: {} - {}", status, body);
        }

        let pinned: PinResponse = response
            .json()
            .await
            .context("Failed to parse Pinata response")?;

        Ok(pinned.ipfs_hash)
    }
}
