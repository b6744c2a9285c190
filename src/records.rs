//! Records handed from one pipeline stage to the next.
//!
//! Each stage reads the previous stage's JSON array and writes its own. A
//! missing input file means "no work", while a malformed one is an error.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed records in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize records for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// How a link was written in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// `[text](url)`
    #[default]
    Markdown,
    /// A bare URL in running text.
    Plain,
}

/// A hyperlink found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: LinkKind,
    pub file: PathBuf,
}

/// A link whose content was archived, with the CID it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub file: PathBuf,
    pub original_url: String,
    pub ipfs_cid: String,
    pub ipfs_url: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: LinkKind,
}

impl MappingRecord {
    /// Build the mapping for an archived link.
    #[must_use]
    pub fn for_link(link: &LinkRecord, cid: String, ipfs_url: String) -> Self {
        Self {
            file: link.file.clone(),
            original_url: link.url.clone(),
            ipfs_cid: cid,
            ipfs_url,
            text: link.text.clone(),
            kind: link.kind,
        }
    }
}

/// Load a record array, treating a missing file as an empty array.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RecordsError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(RecordsError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| RecordsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a record array as pretty-printed JSON, replacing any existing file.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), RecordsError> {
    let json = serde_json::to_string_pretty(records).map_err(|e| RecordsError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    tokio::fs::write(path, json)
        .await
        .map_err(|e| RecordsError::Write {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_record_wire_format() {
        let link = LinkRecord {
            url: "https://example.com".to_string(),
            text: "Example".to_string(),
            kind: LinkKind::Markdown,
            file: PathBuf::from("docs/a.md"),
        };
        let value = serde_json::to_value(&link).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "url": "https://example.com",
                "text": "Example",
                "type": "markdown",
                "file": "docs/a.md",
            })
        );
    }

    #[test]
    fn test_mapping_defaults_for_missing_fields() {
        let json = r#"[{
            "file": "docs/a.md",
            "original_url": "https://example.com",
            "ipfs_cid": "QmTest",
            "ipfs_url": "https://ipfs.io/ipfs/QmTest"
        }]"#;
        let mappings: Vec<MappingRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(mappings[0].kind, LinkKind::Markdown);
        assert!(mappings[0].text.is_empty());
    }

    #[test]
    fn test_plain_kind_parses() {
        let kind: LinkKind = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(kind, LinkKind::Plain);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<LinkRecord> = load_records(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result: Result<Vec<LinkRecord>, _> = load_records(&path).await;
        assert!(matches!(result, Err(RecordsError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let link = LinkRecord {
            url: "https://example.com/page".to_string(),
            text: String::new(),
            kind: LinkKind::Plain,
            file: PathBuf::from("docs/b.md"),
        };
        let mapping = MappingRecord::for_link(
            &link,
            "QmAbc".to_string(),
            "https://ipfs.io/ipfs/QmAbc".to_string(),
        );

        write_records(&path, std::slice::from_ref(&mapping)).await.unwrap();
        let loaded: Vec<MappingRecord> = load_records(&path).await.unwrap();
        assert_eq!(loaded, vec![mapping]);

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("\n  "), "output should be pretty printed");
    }
}
