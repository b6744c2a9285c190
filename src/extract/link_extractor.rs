use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::records::{LinkKind, LinkRecord};

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^\)]+)\)").unwrap());

static URL_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s)]+").unwrap());

/// A link extracted from document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// The link target.
    pub url: String,
    /// Link text for markdown links, empty for bare URLs.
    pub text: String,
    pub kind: LinkKind,
}

impl ExtractedLink {
    /// Tag the link with the document it came from.
    #[must_use]
    pub fn into_record(self, file: &Path) -> LinkRecord {
        LinkRecord {
            url: self.url,
            text: self.text,
            kind: self.kind,
            file: file.to_path_buf(),
        }
    }
}

/// Extract all HTTP(S) links from markdown text.
///
/// Markdown links come first in document order, followed by bare URLs. A bare
/// URL that is also the target of a markdown link in the same text is not
/// reported twice.
#[must_use]
pub fn extract_links(content: &str) -> Vec<ExtractedLink> {
    let mut links = Vec::new();
    let mut markdown_targets = HashSet::new();

    for caps in MARKDOWN_LINK.captures_iter(content) {
        let text = &caps[1];
        let url = &caps[2];
        markdown_targets.insert(url.to_string());

        if url.starts_with("http") {
            links.push(ExtractedLink {
                url: url.to_string(),
                text: text.to_string(),
                kind: LinkKind::Markdown,
            });
        }
    }

    for span in bare_url_spans(content) {
        let url = &content[span];
        if markdown_targets.contains(url) {
            continue;
        }
        links.push(ExtractedLink {
            url: url.to_string(),
            text: String::new(),
            kind: LinkKind::Plain,
        });
    }

    links
}

/// Byte ranges of URLs written bare in running text.
///
/// A bare URL is a whole `https?://[^\s)]+` token not directly preceded by
/// `(`, so link targets in `](...)` never qualify. A URL closing a prose
/// parenthesis, as in `(see https://a.example)`, still does.
#[must_use]
pub fn bare_url_spans(content: &str) -> Vec<Range<usize>> {
    let bytes = content.as_bytes();

    URL_TOKEN
        .find_iter(content)
        .filter(|m| m.start() == 0 || bytes[m.start() - 1] != b'(')
        .map(|m| m.range())
        .collect()
}

/// Every URL-looking token in the text, wherever it appears.
#[must_use]
pub fn all_urls(content: &str) -> HashSet<String> {
    URL_TOKEN
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}
