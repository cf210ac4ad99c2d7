use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::SourceId;

#[derive(Debug, Error, Diagnostic)]
pub enum BoxartError {
    #[error("invalid platform id: {0}")]
    InvalidPlatform(String),

    #[error("no games directory configured for platform {0}")]
    UnknownPlatform(String),

    #[error("missing config file boxart.json")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to build HTTP client: {0}")]
    Http(String),

    #[error("{adapter} request failed: {message}")]
    SourceUnreachable { adapter: SourceId, message: String },

    #[error("{adapter} returned status {status}")]
    SourceStatus { adapter: SourceId, status: u16 },

    #[error("{adapter} response did not contain the expected content: {message}")]
    ParseMismatch { adapter: SourceId, message: String },

    #[error("download of {url} failed: {message}")]
    DownloadFailure { url: String, message: String },

    #[error("download of {url} returned status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("{url} is not a supported image ({content_type})")]
    UnsupportedImage { url: String, content_type: String },

    #[error("failed to store artwork: {0}")]
    PersistFailure(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("{0}")]
    InvalidSession(String),

    #[error("resolution was cancelled")]
    Cancelled,
}

impl BoxartError {
    /// Errors that happened while fetching the chosen image itself.
    pub fn is_download(&self) -> bool {
        matches!(
            self,
            BoxartError::DownloadFailure { .. }
                | BoxartError::DownloadStatus { .. }
                | BoxartError::UnsupportedImage { .. }
        )
    }
}
