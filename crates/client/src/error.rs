//! Source client error types.

use std::path::PathBuf;
use std::sync::Arc;

/// Errors from the catalog client and the article library.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Base URL or resource path does not form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// HTTP error response.
    #[error("HTTP error: {status} from {url}")]
    Http { status: u16, url: String },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response or document parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Library file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ClientError::Timeout } else { ClientError::Network(Arc::new(err)) }
    }
}

impl From<ClientError> for sitecache_core::Error {
    fn from(err: ClientError) -> Self {
        sitecache_core::Error::Refresh(err.to_string())
    }
}
