//! Site definitions.
//!
//! A site owns one namespace: it declares the namespace's relations, keeps
//! them refreshed, and answers list methods by compiling queries through
//! core.

pub mod atcoder;
pub mod difficulty;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Json;
use sitecache_core::{Error, Namespace, Session};

use crate::error::ServerError;
use crate::params::Params;

/// Method every site supports: ensure storage and refresh, return nothing.
pub const CHECK_STORAGE: &str = "checkStorage";

/// Registered sites by name.
pub type Sites = HashMap<&'static str, Arc<dyn Site>>;

#[async_trait]
pub trait Site: Send + Sync {
    /// Namespace name.
    fn name(&self) -> &'static str;

    /// Schema version of the namespace.
    fn version(&self) -> &'static str;

    /// Methods callable after [`CHECK_STORAGE`].
    fn methods(&self) -> &'static [&'static str];

    fn supports(&self, method: &str) -> bool {
        method == CHECK_STORAGE || self.methods().contains(&method)
    }

    /// Ensure the namespace and its relations exist and are fresh enough.
    async fn check_storage<'s>(&self, session: &'s Session) -> Result<Namespace<'s>, Error>;

    /// Run a list method against a checked namespace.
    async fn call(&self, method: &str, namespace: &Namespace<'_>, params: &Params) -> Result<Json, ServerError>;
}
