use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// A credential that must never show up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// API key pair for the Pinata pinning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinataCredentials {
    pub api_key: Secret,
    pub secret_key: Secret,
}

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Documents
    pub content_root: PathBuf,
    pub document_extension: String,
    pub git_path: String,
    pub incremental_links: bool,

    // Stage hand-off
    pub link_records_path: PathBuf,
    pub mapping_records_path: PathBuf,
    pub summary_output_path: Option<PathBuf>,

    // Downloads
    pub download_dir: PathBuf,
    pub yt_dlp_path: String,
    pub video_max_height: u32,
    pub video_download_timeout: Duration,
    pub webpage_timeout: Duration,

    // Upload backends
    pub pinata: Option<PinataCredentials>,
    pub pinata_api_url: String,
    pub web3_storage_token: Option<Secret>,
    pub web3_storage_api_url: String,
    pub upload_timeout: Duration,
    pub ipfs_path: String,
    pub ipfs_gateway_url: String,

    // Rewriting
    pub archive_label: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Documents
            content_root: PathBuf::from(env_or_default("CONTENT_ROOT", "content")),
            document_extension: env_or_default("DOCUMENT_EXTENSION", "md"),
            git_path: env_or_default("GIT_PATH", "git"),
            incremental_links: parse_env_bool("INCREMENTAL_LINKS", false)?,

            // Stage hand-off
            link_records_path: PathBuf::from(env_or_default(
                "LINK_RECORDS_PATH",
                "link-records.json",
            )),
            mapping_records_path: PathBuf::from(env_or_default(
                "MAPPING_RECORDS_PATH",
                "mapping-records.json",
            )),
            summary_output_path: optional_env("GITHUB_OUTPUT").map(PathBuf::from),

            // Downloads
            download_dir: PathBuf::from(env_or_default("DOWNLOAD_DIR", "downloads")),
            yt_dlp_path: env_or_default("YT_DLP_PATH", "yt-dlp"),
            video_max_height: parse_env_u32("VIDEO_MAX_HEIGHT", 720)?,
            video_download_timeout: Duration::from_secs(parse_env_u64(
                "VIDEO_DOWNLOAD_TIMEOUT_SECS",
                3600,
            )?),
            webpage_timeout: Duration::from_secs(parse_env_u64("WEBPAGE_TIMEOUT_SECS", 30)?),

            // Upload backends
            pinata: pinata_credentials(
                optional_env("PINATA_API_KEY"),
                optional_env("PINATA_SECRET_KEY"),
            ),
            pinata_api_url: env_or_default("PINATA_API_URL", "https://api.pinata.cloud"),
            web3_storage_token: optional_env("WEB3_STORAGE_TOKEN").map(Secret::new),
            web3_storage_api_url: env_or_default(
                "WEB3_STORAGE_API_URL",
                "https://api.web3.storage",
            ),
            upload_timeout: Duration::from_secs(parse_env_u64("UPLOAD_TIMEOUT_SECS", 300)?),
            ipfs_path: env_or_default("IPFS_PATH_BIN", "ipfs"),
            ipfs_gateway_url: env_or_default("IPFS_GATEWAY_URL", "https://ipfs.io/ipfs/"),

            // Rewriting
            archive_label: env_or_default("ARCHIVE_LABEL", "IPFS"),
        })
    }

    /// Configuration with defaults and no credentials, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            content_root: PathBuf::from("content"),
            document_extension: "md".to_string(),
            git_path: "git".to_string(),
            incremental_links: false,
            link_records_path: PathBuf::from("link-records.json"),
            mapping_records_path: PathBuf::from("mapping-records.json"),
            summary_output_path: None,
            download_dir: PathBuf::from("downloads"),
            yt_dlp_path: "yt-dlp".to_string(),
            video_max_height: 720,
            video_download_timeout: Duration::from_secs(60),
            webpage_timeout: Duration::from_secs(5),
            pinata: None,
            pinata_api_url: "https://api.pinata.cloud".to_string(),
            web3_storage_token: None,
            web3_storage_api_url: "https://api.web3.storage".to_string(),
            upload_timeout: Duration::from_secs(5),
            ipfs_path: "ipfs".to_string(),
            ipfs_gateway_url: "https://ipfs.io/ipfs/".to_string(),
            archive_label: "IPFS".to_string(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document_extension.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "DOCUMENT_EXTENSION".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.video_max_height == 0 {
            return Err(ConfigError::InvalidValue {
                name: "VIDEO_MAX_HEIGHT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.webpage_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "WEBPAGE_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.upload_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "UPLOAD_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.ipfs_gateway_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "IPFS_GATEWAY_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn pinata_credentials(
    api_key: Option<String>,
    secret_key: Option<String>,
) -> Option<PinataCredentials> {
    match (api_key, secret_key) {
        (Some(api_key), Some(secret_key)) => Some(PinataCredentials {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
        }),
        (Some(_), None) | (None, Some(_)) => {
            warn!("Only one of PINATA_API_KEY and PINATA_SECRET_KEY is set; Pinata uploads disabled");
            None
        }
        (None, None) => None,
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
