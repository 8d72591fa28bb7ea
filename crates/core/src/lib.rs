//! Core types and shared functionality for sitecache.
//!
//! This crate provides:
//! - A namespaced relation store over SQLite
//! - Refresh coordination with staleness windows and leases
//! - Query compilation for filtered, ordered, paginated listings
//! - Side-metadata counters and curated annotations
//! - Unified error types and configuration

pub mod aggregate;
pub mod annotations;
pub mod config;
pub mod error;
pub mod namespace;
pub mod query;
pub mod refresh;
pub mod source;
pub mod store;

pub use aggregate::Counters;
pub use annotations::Annotation;
pub use config::AppConfig;
pub use error::Error;
pub use namespace::Namespace;
pub use query::{CompiledQuery, Listing, QueryParams};
pub use refresh::{RefreshOutcome, RefreshPolicy, RefreshRoutine, RefreshState};
pub use source::Source;
pub use store::{Session, Store};
pub use tokio_rusqlite::rusqlite::types::Value;
