use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::git::Git;

/// Decide which documents to scan.
///
/// Uses the files changed by the last commit when git can tell us, and every
/// document under `content_root` otherwise.
pub async fn documents_to_scan(git: &Git, content_root: &Path, extension: &str) -> Vec<PathBuf> {
    match git.changed_files().await {
        Ok(changed) => {
            let documents: Vec<PathBuf> = changed
                .into_iter()
                .filter(|path| has_extension(path, extension) && is_under(path, content_root))
                .collect();
            info!(count = documents.len(), "Using documents changed in last commit");
            documents
        }
        Err(e) => {
            info!(
                root = %content_root.display(),
                "No previous revision available ({e:#}), scanning all documents"
            );
            match find_documents(content_root, extension).await {
                Ok(documents) => documents,
                Err(e) => {
                    warn!(root = %content_root.display(), "Failed to list documents: {e:#}");
                    Vec::new()
                }
            }
        }
    }
}

/// Recursively list files under `root` with the given extension, sorted.
///
/// A missing root yields an empty list.
///
/// # Errors
///
/// Returns an error if a directory under an existing root cannot be read.
pub async fn find_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !tokio::fs::try_exists(root).await.unwrap_or(false) {
        warn!(root = %root.display(), "Content root not found");
        return Ok(Vec::new());
    }

    // Async recursion is not allowed without boxing; use an explicit stack.
    let mut documents = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() && has_extension(&path, extension) {
                documents.push(path);
            }
        }
    }

    documents.sort();
    debug!(root = %root.display(), count = documents.len(), "Found documents");
    Ok(documents)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn is_under(path: &Path, root: &Path) -> bool {
    let root = root.strip_prefix(".").unwrap_or(root);
    root.as_os_str().is_empty() || path.starts_with(root)
}
