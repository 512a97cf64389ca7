use thiserror::Error;

/// Typed content-write errors enabling retry classification for media
/// downloads. Per-item failures built from these end up in the manifest's
/// failure list rather than aborting the category.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("HTTP error {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("download of {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("external tool failed: {0}")]
    Tool(#[from] crate::process::ProcessError),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("retries exhausted after {retries} retries for {url}: {last_error}")]
    RetriesExhausted {
        retries: u32,
        url: String,
        last_error: String,
    },
}

impl WriteError {
    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            WriteError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            WriteError::Http { .. } => true,
            WriteError::Disk(_) => false,
            WriteError::Tool(_) => false,
            WriteError::Serialize(_) => false,
            WriteError::RetriesExhausted { .. } => false,
        }
    }
}

/// A single item's recorded failure, carried into the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}
