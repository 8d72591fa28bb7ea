//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

use crate::config::AppConfig;
use thiserror::Error;

/// Largest batch accepted for bulk inserts; keeps statements well under
/// SQLite's bound-variable limit for wide relations.
const MAX_INSERT_BATCH_SIZE: usize = 1_000;

/// Longest refresh lease accepted: thirty days.
const MAX_REFRESH_LEASE_SECS: u64 = 30 * 86_400;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `insert_batch_size` is 0 or exceeds 1000
    /// - `stale_after_secs` is 0
    /// - `refresh_lease_secs` is less than a minute or more than thirty days
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `listen_addr` is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.insert_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "insert_batch_size".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.insert_batch_size > MAX_INSERT_BATCH_SIZE {
            return Err(ConfigError::Invalid {
                field: "insert_batch_size".into(),
                reason: format!("must not exceed {MAX_INSERT_BATCH_SIZE}"),
            });
        }

        if self.stale_after_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "stale_after_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.refresh_lease_secs < 60 {
            return Err(ConfigError::Invalid {
                field: "refresh_lease_secs".into(),
                reason: "must be at least 60 seconds".into(),
            });
        }
        if self.refresh_lease_secs > MAX_REFRESH_LEASE_SECS {
            return Err(ConfigError::Invalid {
                field: "refresh_lease_secs".into(),
                reason: format!("must not exceed {MAX_REFRESH_LEASE_SECS} seconds"),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "listen_addr".into(),
                reason: format!("'{}' is not a socket address", self.listen_addr),
            });
        }

        if self.refresh_lease_secs > self.stale_after_secs {
            tracing::warn!(
                refresh_lease_secs = self.refresh_lease_secs,
                stale_after_secs = self.stale_after_secs,
                "refresh lease outlives the staleness window; \
                 a crashed refresh blocks more than one window"
            );
        }

        Ok(())
    }
}
