//! Data sources for sitecache.
//!
//! This crate provides the upstream side of refreshes: an HTTP client for
//! the problem archive catalog and a reader for the curated article library.

pub mod articles;
pub mod atcoder;
pub mod error;

pub use articles::{ArticleLibrary, SiteArticles};
pub use atcoder::{Catalog, CatalogClient, CatalogConfig, CatalogRecord};
pub use error::ClientError;
