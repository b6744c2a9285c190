//! Archive stage: download linked content and upload it to IPFS.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub mod webpage;
pub mod ytdlp;

pub use webpage::WebpageFetcher;
pub use ytdlp::VideoDownloader;

use crate::config::Config;
use crate::constants::{DOWNLOAD_NAME_HASH_LEN, VIDEO_DOMAINS};
use crate::ipfs::{UploadChain, UploadMetadata};
use crate::records::{load_records, write_records, LinkRecord, MappingRecord};

/// How a link's content is downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Video,
    Webpage,
}

impl ContentKind {
    /// Classify a URL by matching known video-hosting domains.
    #[must_use]
    pub fn classify(url: &str) -> Self {
        let lower = url.to_lowercase();
        if VIDEO_DOMAINS.iter().any(|domain| lower.contains(domain)) {
            Self::Video
        } else {
            Self::Webpage
        }
    }
}

/// File stem for a download: a truncated hex digest of the URL.
#[must_use]
pub fn download_name(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    digest[..DOWNLOAD_NAME_HASH_LEN].to_string()
}

/// Downloads the content behind a URL into a directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Download `url` into `dest_dir` and return the path of the saved file.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing could be downloaded.
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Outcome of one archive run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveSummary {
    pub attempted: usize,
    pub archived: usize,
}

/// Downloads each link and uploads the result through the backend chain.
pub struct Archiver {
    download_dir: PathBuf,
    gateway_url: String,
    video: Box<dyn Fetcher>,
    webpage: Box<dyn Fetcher>,
    uploads: UploadChain,
}

impl Archiver {
    #[must_use]
    pub fn new(
        download_dir: PathBuf,
        gateway_url: String,
        video: Box<dyn Fetcher>,
        webpage: Box<dyn Fetcher>,
        uploads: UploadChain,
    ) -> Self {
        Self {
            download_dir,
            gateway_url,
            video,
            webpage,
            uploads,
        }
    }

    /// Build an archiver with the real downloaders and configured backends.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let video = VideoDownloader::new(
            config.yt_dlp_path.clone(),
            config.video_max_height,
            config.video_download_timeout,
        );
        let webpage = WebpageFetcher::new(config.webpage_timeout)?;
        let uploads = UploadChain::from_config(config)?;

        Ok(Self::new(
            config.download_dir.clone(),
            config.ipfs_gateway_url.clone(),
            Box::new(video),
            Box::new(webpage),
            uploads,
        ))
    }

    /// Archive every link, returning mappings for those that got a CID.
    pub async fn archive_all(&self, links: &[LinkRecord]) -> Vec<MappingRecord> {
        let mut mappings = Vec::new();
        for link in links {
            if let Some(mapping) = self.process_link(link).await {
                mappings.push(mapping);
            }
        }
        mappings
    }

    /// Download a link's content and upload it.
    ///
    /// Returns `None` when the download or every upload fails. The downloaded
    /// file is removed either way.
    pub async fn process_link(&self, link: &LinkRecord) -> Option<MappingRecord> {
        let kind = ContentKind::classify(&link.url);
        let fetcher = match kind {
            ContentKind::Video => &self.video,
            ContentKind::Webpage => &self.webpage,
        };

        info!(url = %link.url, fetcher = fetcher.name(), "Processing link");

        let path = match fetcher.fetch(&link.url, &self.download_dir).await {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    url = %link.url,
                    file = %link.file.display(),
                    "Download failed, link not archived: {e:#}"
                );
                return None;
            }
        };

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(url = %link.url, path = %path.display(), "Downloaded file missing: {e}");
                return None;
            }
        };
        info!(
            path = %path.display(),
            size_mb = %format!("{:.2}", size as f64 / 1024.0 / 1024.0),
            "Downloaded"
        );

        let metadata = UploadMetadata::for_file(&path, &link.url);
        let uploaded = self.uploads.upload(&path, &metadata).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), "Failed to remove download: {e}");
        }

        match uploaded {
            Some(uploaded) => {
                let ipfs_url = format!("{}{}", self.gateway_url, uploaded.cid);
                Some(MappingRecord::for_link(link, uploaded.cid, ipfs_url))
            }
            None => {
                warn!(
                    url = %link.url,
                    file = %link.file.display(),
                    "Every upload backend failed, link not archived"
                );
                None
            }
        }
    }
}

/// Run the archive stage.
///
/// With no input links the mapping file is written empty and no backend is
/// contacted.
///
/// # Errors
///
/// Returns an error if the link records file is malformed or an output cannot
/// be written.
pub async fn run(config: &Config) -> Result<ArchiveSummary> {
    let links: Vec<LinkRecord> = load_records(&config.link_records_path)
        .await
        .context("Failed to load link records")?;

    if links.is_empty() {
        info!("No new links to process");
        write_records::<MappingRecord>(&config.mapping_records_path, &[])
            .await
            .context("Failed to write mapping records")?;
        return Ok(ArchiveSummary::default());
    }

    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create download directory: {}",
                config.download_dir.display()
            )
        })?;

    let archiver = Archiver::from_config(config)?;
    let mappings = archiver.archive_all(&links).await;

    write_records(&config.mapping_records_path, &mappings)
        .await
        .context("Failed to write mapping records")?;

    info!(
        archived = mappings.len(),
        attempted = links.len(),
        "Successfully uploaded {} out of {} links to IPFS",
        mappings.len(),
        links.len()
    );

    Ok(ArchiveSummary {
        attempted: links.len(),
        archived: mappings.len(),
    })
}
