//! Uploading archived files to IPFS.
//!
//! Backends are tried in order until one returns a CID: the Pinata pinning
//! service, then Web3.Storage, then the local `ipfs` daemon. Remote backends
//! only take part when their credentials are configured.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

mod local;
mod pinata;
mod web3_storage;

pub use local::LocalDaemon;
pub use pinata::PinataClient;
pub use web3_storage::Web3StorageClient;

use crate::config::Config;

/// Descriptive metadata sent along with an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    /// Name the file is stored under.
    pub name: String,
    /// URL the content was downloaded from.
    pub original_url: String,
}

impl UploadMetadata {
    #[must_use]
    pub fn for_file(path: &Path, original_url: &str) -> Self {
        Self {
            name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("file")
                .to_string(),
            original_url: original_url.to_string(),
        }
    }
}

/// A storage backend that turns a file into a CID.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Upload the file and return its CID.
    ///
    /// # Errors
    ///
    /// Returns an error on transport, service, or process failure.
    async fn upload(&self, path: &Path, metadata: &UploadMetadata) -> Result<String>;
}

/// A CID and the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub cid: String,
    pub backend: &'static str,
}

/// Ordered fallback list of upload backends.
pub struct UploadChain {
    uploaders: Vec<Box<dyn Uploader>>,
}

impl UploadChain {
    #[must_use]
    pub fn new(uploaders: Vec<Box<dyn Uploader>>) -> Self {
        Self { uploaders }
    }

    /// Build the chain from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.upload_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut uploaders: Vec<Box<dyn Uploader>> = Vec::new();

        if let Some(credentials) = &config.pinata {
            uploaders.push(Box::new(PinataClient::new(
                http.clone(),
                &config.pinata_api_url,
                credentials.clone(),
            )));
        }
        if let Some(token) = &config.web3_storage_token {
            uploaders.push(Box::new(Web3StorageClient::new(
                http,
                &config.web3_storage_api_url,
                token.clone(),
            )));
        }
        uploaders.push(Box::new(LocalDaemon::new(config.ipfs_path.clone())));

        info!(
            backends = ?uploaders.iter().map(|u| u.name()).collect::<Vec<_>>(),
            "Upload backends configured"
        );

        Ok(Self::new(uploaders))
    }

    /// Names of the backends in the order they are tried.
    #[must_use]
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.uploaders.iter().map(|u| u.name()).collect()
    }

    /// Try each backend in turn and return the first CID obtained.
    ///
    /// Backend failures are logged and never propagated.
    pub async fn upload(&self, path: &Path, metadata: &UploadMetadata) -> Option<Uploaded> {
        for uploader in &self.uploaders {
            debug!(backend = uploader.name(), file = %path.display(), "Uploading");

            match uploader.upload(path, metadata).await {
                Ok(cid) if !cid.trim().is_empty() => {
                    let cid = cid.trim().to_string();
                    info!(backend = uploader.name(), cid = %cid, "Uploaded to IPFS");
                    return Some(Uploaded {
                        cid,
                        backend: uploader.name(),
                    });
                }
                Ok(_) => {
                    warn!(backend = uploader.name(), "Upload returned an empty CID");
                }
                Err(e) => {
                    warn!(backend = uploader.name(), "Upload failed: {e:#}");
                }
            }
        }

        None
    }
}

impl std::fmt::Debug for UploadChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadChain")
            .field("backends", &self.backend_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::config::{PinataCredentials, Secret};

    struct Scripted {
        name: &'static str,
        result: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Uploader for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn upload(&self, _path: &Path, _metadata: &UploadMetadata) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Some(cid) => Ok(cid.to_string()),
                None => anyhow::bail!("{} unavailable", self.name),
            }
        }
    }

    fn scripted(name: &'static str, result: Option<&'static str>) -> (Box<dyn Uploader>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let uploader = Scripted {
            name,
            result,
            calls: Arc::clone(&calls),
        };
        (Box::new(uploader), calls)
    }

    fn metadata() -> UploadMetadata {
        UploadMetadata {
            name: "abc.html".to_string(),
            original_url: "https://example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let (first, first_calls) = scripted("first", Some("QmFirst"));
        let (second, second_calls) = scripted("second", Some("QmSecond"));
        let chain = UploadChain::new(vec![first, second]);

        let uploaded = chain.upload(Path::new("abc.html"), &metadata()).await.unwrap();
        assert_eq!(uploaded.cid, "QmFirst");
        assert_eq!(uploaded.backend, "first");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_falls_through() {
        let (first, _) = scripted("first", None);
        let (second, _) = scripted("second", Some(""));
        let (third, third_calls) = scripted("third", Some("QmThird\n"));
        let chain = UploadChain::new(vec![first, second, third]);

        let uploaded = chain.upload(Path::new("abc.html"), &metadata()).await.unwrap();
        assert_eq!(uploaded.cid, "QmThird");
        assert_eq!(third_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failures_yield_none() {
        let (first, _) = scripted("first", None);
        let (second, _) = scripted("second", None);
        let chain = UploadChain::new(vec![first, second]);

        assert!(chain.upload(Path::new("abc.html"), &metadata()).await.is_none());
    }

    #[test]
    fn test_chain_order_follows_credentials() {
        let config = Config::for_testing();
        let chain = UploadChain::from_config(&config).unwrap();
        assert_eq!(chain.backend_names(), vec!["local"]);

        let config = Config {
            pinata: Some(PinataCredentials {
                api_key: Secret::new("key"),
                secret_key: Secret::new("secret"),
            }),
            web3_storage_token: Some(Secret::new("token")),
            ..Config::for_testing()
        };
        let chain = UploadChain::from_config(&config).unwrap();
        assert_eq!(chain.backend_names(), vec!["pinata", "web3.storage", "local"]);
    }

    #[test]
    fn test_metadata_for_file() {
        let meta = UploadMetadata::for_file(Path::new("downloads/abc123.mp4"), "https://youtu.be/x");
        assert_eq!(meta.name, "abc123.mp4");
        assert_eq!(meta.original_url, "https://youtu.be/x");
    }
}
