//! Integration tests for the document rewrite stage.

use std::path::{Path, PathBuf};

use docs_ipfs_archiver::config::Config;
use docs_ipfs_archiver::extract::extract_links;
use docs_ipfs_archiver::records::{write_records, LinkKind, MappingRecord};
use docs_ipfs_archiver::rewrite::{self, rewrite_documents};
use tempfile::TempDir;

fn mapping(file: &Path, url: &str, cid: &str, kind: LinkKind) -> MappingRecord {
    MappingRecord {
        file: file.to_path_buf(),
        original_url: url.to_string(),
        ipfs_cid: cid.to_string(),
        ipfs_url: format!("https://ipfs.io/ipfs/{cid}"),
        text: String::new(),
        kind,
    }
}

async fn write_doc(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path
}

#[tokio::test]
async fn test_round_trip_keeps_original_link() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "a.md", "Intro [text](http://x) outro\n").await;

    let summary = rewrite_documents(
        &[mapping(&doc, "http://x", "Qm123", LinkKind::Markdown)],
        "IPFS",
    )
    .await;
    assert_eq!(summary.documents_updated, 1);
    assert_eq!(summary.updates, 1);

    let content = tokio::fs::read_to_string(&doc).await.unwrap();
    assert_eq!(
        content,
        "Intro [text](http://x) ([IPFS](https://ipfs.io/ipfs/Qm123)) outro\n"
    );

    let links = extract_links(&content);
    assert!(links
        .iter()
        .any(|l| l.url == "http://x" && l.text == "text" && l.kind == LinkKind::Markdown));
}

#[tokio::test]
async fn test_rerun_appends_duplicate_annotation() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "a.md", "[text](http://x)").await;
    let mappings = vec![mapping(&doc, "http://x", "Qm123", LinkKind::Markdown)];

    rewrite_documents(&mappings, "IPFS").await;
    let second = rewrite_documents(&mappings, "IPFS").await;
    assert_eq!(second.updates, 1);

    let content = tokio::fs::read_to_string(&doc).await.unwrap();
    assert_eq!(
        content.matches("([IPFS](https://ipfs.io/ipfs/Qm123))").count(),
        2,
        "rewriting is not idempotent: {content}"
    );
}

#[tokio::test]
async fn test_plain_and_markdown_mappings_in_one_document() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "a.md",
        "See [demo](https://youtu.be/abc) and https://example.com/page\n",
    )
    .await;
    let mappings = vec![
        mapping(&doc, "https://youtu.be/abc", "QmVideo", LinkKind::Markdown),
        mapping(&doc, "https://example.com/page", "QmPage", LinkKind::Plain),
    ];

    let summary = rewrite_documents(&mappings, "IPFS").await;
    assert_eq!(summary.updates, 2);

    let content = tokio::fs::read_to_string(&doc).await.unwrap();
    assert_eq!(
        content,
        "See [demo](https://youtu.be/abc) ([IPFS](https://ipfs.io/ipfs/QmVideo)) and \
         https://example.com/page ([IPFS](https://ipfs.io/ipfs/QmPage))\n"
    );
}

#[tokio::test]
async fn test_unmatched_mapping_leaves_document_untouched() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "a.md", "The link was edited away.").await;
    let before = tokio::fs::metadata(&doc).await.unwrap().modified().unwrap();

    let summary = rewrite_documents(
        &[mapping(&doc, "http://gone", "QmGone", LinkKind::Markdown)],
        "IPFS",
    )
    .await;

    assert_eq!(summary.updates, 0);
    assert_eq!(summary.documents_updated, 0);
    let after = tokio::fs::metadata(&doc).await.unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_missing_document_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let present = write_doc(&dir, "b.md", "[b](http://b)").await;
    let missing = dir.path().join("deleted.md");

    let summary = rewrite_documents(
        &[
            mapping(&missing, "http://a", "QmA", LinkKind::Markdown),
            mapping(&present, "http://b", "QmB", LinkKind::Markdown),
        ],
        "IPFS",
    )
    .await;

    assert_eq!(summary.documents_updated, 1);
    assert!(!missing.exists());
    let content = tokio::fs::read_to_string(&present).await.unwrap();
    assert!(content.contains("QmB"));
}

#[tokio::test]
async fn test_run_reads_mapping_file() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "a.md", "https://example.com/page").await;
    let config = Config {
        mapping_records_path: dir.path().join("mapping-records.json"),
        archive_label: "archived".to_string(),
        ..Config::for_testing()
    };
    write_records(
        &config.mapping_records_path,
        &[mapping(&doc, "https://example.com/page", "QmPage", LinkKind::Plain)],
    )
    .await
    .unwrap();

    let summary = rewrite::run(&config).await.expect("rewrite failed");
    assert_eq!(summary.updates, 1);

    let content = tokio::fs::read_to_string(&doc).await.unwrap();
    assert_eq!(
        content,
        "https://example.com/page ([archived](https://ipfs.io/ipfs/QmPage))"
    );
}

#[tokio::test]
async fn test_run_without_mapping_file_is_noop() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        mapping_records_path: dir.path().join("absent.json"),
        ..Config::for_testing()
    };

    let summary = rewrite::run(&config).await.expect("rewrite failed");
    assert_eq!(summary, rewrite::RewriteSummary::default());
}

#[tokio::test]
async fn test_run_rejects_malformed_mapping_file() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        mapping_records_path: dir.path().join("mapping-records.json"),
        ..Config::for_testing()
    };
    tokio::fs::write(&config.mapping_records_path, "[{\"file\": 3}]")
        .await
        .unwrap();

    assert!(rewrite::run(&config).await.is_err());
}
