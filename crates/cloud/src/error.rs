//! Error types for remote data access.

use thiserror::Error;

/// Errors produced while resolving or downloading remote stacks.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("article {article} has no file for {qoi}")]
    MissingFile { article: u64, qoi: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("core error: {0}")]
    Core(#[from] flowuq_core::Error),
}

impl From<CloudError> for flowuq_core::Error {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::Core(inner) => inner,
            other => flowuq_core::Error::Source(Box::new(other)),
        }
    }
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
