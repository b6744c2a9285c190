//! Link extraction stage.
//!
//! Scans changed documents for hyperlinks and writes one record per link to
//! the link records file for the archive stage.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub mod documents;
pub mod link_extractor;

pub use documents::{documents_to_scan, find_documents};
pub use link_extractor::{all_urls, bare_url_spans, extract_links, ExtractedLink};

use crate::config::Config;
use crate::constants::LINK_COUNT_OUTPUT_KEY;
use crate::git::Git;
use crate::records::{write_records, LinkRecord};

/// Outcome of one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractSummary {
    pub documents_scanned: usize,
    pub links_found: usize,
}

/// Run the extraction stage.
///
/// The link records file is always written, empty when there is nothing to do.
///
/// # Errors
///
/// Returns an error if the link records file cannot be written.
pub async fn run(config: &Config) -> Result<ExtractSummary> {
    let git = Git::new(config.git_path.clone());
    let documents =
        documents_to_scan(&git, &config.content_root, &config.document_extension).await;

    if documents.is_empty() {
        info!("No modified documents found");
    }

    let filter = config.incremental_links.then_some(&git);
    let (links, documents_scanned) = extract_from_documents(&documents, filter).await;

    write_records(&config.link_records_path, &links)
        .await
        .context("Failed to write link records")?;

    info!(
        total = links.len(),
        path = %config.link_records_path.display(),
        "Total new links found"
    );

    if let Some(sink) = &config.summary_output_path {
        if let Err(e) = append_summary(sink, LINK_COUNT_OUTPUT_KEY, links.len()).await {
            warn!(path = %sink.display(), "Failed to write run summary: {e:#}");
        }
    }

    Ok(ExtractSummary {
        documents_scanned,
        links_found: links.len(),
    })
}

/// Extract links from each readable document, tagging records with their file.
///
/// With `previous` set, links whose URL already appeared in the previous
/// revision of the document are dropped. Returns the records and the number of
/// documents actually read.
pub async fn extract_from_documents(
    documents: &[PathBuf],
    previous: Option<&Git>,
) -> (Vec<LinkRecord>, usize) {
    let mut records = Vec::new();
    let mut scanned = 0;

    for path in documents {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = %path.display(), "Document no longer exists, skipping");
                continue;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to read document, skipping");
                continue;
            }
        };
        scanned += 1;

        debug!(file = %path.display(), "Scanning");
        let mut links = extract_links(&content);

        if let Some(git) = previous {
            links = retain_new_links(git, path, links).await;
        }

        info!(file = %path.display(), count = links.len(), "Found new link(s)");
        records.extend(links.into_iter().map(|link| link.into_record(path)));
    }

    (records, scanned)
}

async fn retain_new_links(git: &Git, path: &Path, links: Vec<ExtractedLink>) -> Vec<ExtractedLink> {
    match git.previous_contents(path).await {
        Ok(old) => {
            let old_urls = all_urls(&old);
            links
                .into_iter()
                .filter(|link| !old_urls.contains(&link.url))
                .collect()
        }
        Err(e) => {
            debug!(file = %path.display(), "No previous revision, all links are new: {e:#}");
            links
        }
    }
}

/// Append a `key=value` line to the run-summary sink.
///
/// # Errors
///
/// Returns an error if the sink cannot be opened or written.
pub async fn append_summary(path: &Path, key: &str, value: impl std::fmt::Display) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    file.write_all(format!("{key}={value}\n").as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.flush().await?;

    Ok(())
}
