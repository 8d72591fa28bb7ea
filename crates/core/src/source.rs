//! Upstream data contract.
//!
//! A [`Source`] is whatever a refresh routine pulls from: a remote catalog,
//! a directory of curated documents. Failures surface as
//! [`Error::Refresh`](crate::Error::Refresh) so the coordinator records the
//! namespace as needing another attempt.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::Error;
use crate::aggregate::Counters;

#[async_trait]
pub trait Source: Send + Sync {
    /// One raw catalog entry.
    type Record: Send;

    /// Fetch the full catalog.
    async fn fetch_catalog(&self) -> Result<Vec<Self::Record>, Error>;

    /// Fetch per-entity counters. Sources without side-metadata return none.
    async fn fetch_side_metadata(&self) -> Result<HashMap<String, Counters>, Error> {
        Ok(HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl Source for Fixed {
        type Record = &'static str;

        async fn fetch_catalog(&self) -> Result<Vec<Self::Record>, Error> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_side_metadata_defaults_to_empty() {
        let source = Fixed(vec!["abc001_a"]);
        assert_eq!(source.fetch_catalog().await.unwrap(), vec!["abc001_a"]);
        assert!(source.fetch_side_metadata().await.unwrap().is_empty());
    }
}
