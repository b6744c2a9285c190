//! Shared constants used across the pipeline.

/// User agent string used for webpage downloads.
///
/// A realistic browser user agent; some sites refuse obvious bot clients.
pub const ARCHIVAL_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Domains whose links are downloaded with the video tool instead of a plain GET.
///
/// Matched as substrings of the lowercased URL.
pub const VIDEO_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "facebook.com/watch",
    "twitter.com",
    "x.com",
];

/// Number of hex characters of the URL hash used for download file names.
pub const DOWNLOAD_NAME_HASH_LEN: usize = 12;

/// Extension used when a webpage's content type maps to no known extension.
pub const DEFAULT_WEBPAGE_EXTENSION: &str = "html";

/// Key written to the run-summary sink with the number of extracted links.
pub const LINK_COUNT_OUTPUT_KEY: &str = "link_count";
