//! Rewrite stage: annotate documents with links to their archived copies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::extract::bare_url_spans;
use crate::records::{load_records, LinkKind, MappingRecord};

/// Outcome of one rewrite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewriteSummary {
    pub documents_updated: usize,
    pub updates: usize,
}

/// Run the rewrite stage against the mapping records file.
///
/// # Errors
///
/// Returns an error if the mapping records file is malformed.
pub async fn run(config: &Config) -> Result<RewriteSummary> {
    let mappings: Vec<MappingRecord> = load_records(&config.mapping_records_path)
        .await
        .context("Failed to load mapping records")?;

    if mappings.is_empty() {
        info!("No IPFS mappings to process");
        return Ok(RewriteSummary::default());
    }

    let summary = rewrite_documents(&mappings, &config.archive_label).await;
    info!(
        documents = summary.documents_updated,
        updates = summary.updates,
        "Total updates made"
    );

    Ok(summary)
}

/// Apply every mapping to its document.
///
/// Missing documents are skipped and a failure on one document does not stop
/// the others.
pub async fn rewrite_documents(mappings: &[MappingRecord], label: &str) -> RewriteSummary {
    let mut summary = RewriteSummary::default();

    for (path, document_mappings) in group_by_file(mappings) {
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(file = %path.display(), "Document not found, skipping");
            continue;
        }

        match rewrite_document(&path, &document_mappings, label).await {
            Ok(0) => {}
            Ok(updates) => {
                info!(file = %path.display(), updates, "Updated document");
                summary.documents_updated += 1;
                summary.updates += updates;
            }
            Err(e) => {
                warn!(file = %path.display(), "Failed to update document: {e:#}");
            }
        }
    }

    summary
}

/// Group mappings by document, keeping the order documents first appear in.
#[must_use]
pub fn group_by_file(mappings: &[MappingRecord]) -> Vec<(PathBuf, Vec<&MappingRecord>)> {
    let mut groups: Vec<(PathBuf, Vec<&MappingRecord>)> = Vec::new();
    let mut index: HashMap<&Path, usize> = HashMap::new();

    for mapping in mappings {
        let slot = *index.entry(mapping.file.as_path()).or_insert_with(|| {
            groups.push((mapping.file.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(mapping);
    }

    groups
}

/// Apply mappings to one document, writing it back only if it changed.
///
/// Returns how many mappings changed the text.
///
/// # Errors
///
/// Returns an error if the document cannot be read or written.
pub async fn rewrite_document(
    path: &Path,
    mappings: &[&MappingRecord],
    label: &str,
) -> Result<usize> {
    let original = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut content = original.clone();
    let mut updates = 0;

    for mapping in mappings {
        let annotated = annotate(&content, mapping, label);
        if annotated != content {
            content = annotated;
            updates += 1;
        }
    }

    if content != original {
        tokio::fs::write(path, &content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(updates)
}

/// Insert an archive link after every occurrence of the mapping's URL.
///
/// Markdown links gain ` ([label](ipfs_url))` after `](url)`. Bare URLs gain
/// the same suffix, but only where the URL is bare text, never inside a link
/// target. Already annotated occurrences are annotated again.
#[must_use]
pub fn annotate(content: &str, mapping: &MappingRecord, label: &str) -> String {
    let url = &mapping.original_url;
    let archive_link = format!(" ([{label}]({}))", mapping.ipfs_url);

    match mapping.kind {
        LinkKind::Markdown => {
            let target = format!("]({url})");
            content.replace(&target, &format!("{target}{archive_link}"))
        }
        LinkKind::Plain => {
            let mut rewritten = String::with_capacity(content.len());
            let mut copied = 0;

            for span in bare_url_spans(content) {
                if &content[span.clone()] != url.as_str() {
                    continue;
                }
                rewritten.push_str(&content[copied..span.end]);
                rewritten.push_str(&archive_link);
                copied = span.end;
            }

            rewritten.push_str(&content[copied..]);
            rewritten
        }
    }
}
