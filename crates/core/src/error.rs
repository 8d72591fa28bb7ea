//! Unified error types for sitecache.
//!
//! Every variant renders with a stable code prefix so the transport can hand
//! callers a single opaque message without losing the category.

use tokio_rusqlite::rusqlite;

/// Unified error type for the storage layer and everything built on it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed identifiers or missing/invalid query parameters.
    ///
    /// Raised before any storage access.
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    /// Requested entity or annotation is absent.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The refresh routine (source fetch or bulk replace) failed.
    #[error("REFRESH_FAILED: {0}")]
    Refresh(String),

    /// Backing store failure, propagated verbatim.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// A global migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Configuration could not be loaded or is invalid.
    #[error("CONFIG_ERROR: {0}")]
    Config(String),
}

impl Error {
    /// Stable code for this error category.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Refresh(_) => "REFRESH_FAILED",
            Error::Database(_) | Error::MigrationFailed(_) => "STORAGE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
