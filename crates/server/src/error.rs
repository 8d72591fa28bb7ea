//! Structured errors for the sitecache server.
//!
//! Storage, validation and refresh failures pass through from core
//! unchanged; the server only adds the failures of its own boundary.

use sitecache_core::Error;

/// Errors surfaced to transport callers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] Error),

    /// The request line is not a valid request object.
    #[error("VALIDATION_ERROR: malformed request: {0}")]
    Malformed(String),

    /// A response could not be encoded.
    #[error("ENCODE_ERROR: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let err = ServerError::from(Error::NotFound("Site x not found".into()));
        assert_eq!(err.to_string(), "NOT_FOUND: Site x not found");
    }
}
