//! Request dispatch.
//!
//! Routes a `(site, method, params)` triple to the article methods or to the
//! named site. Every site method runs after the site's storage check, on a
//! session opened for that request alone.

use std::sync::Arc;

use serde_json::Value as Json;
use sitecache_client::ArticleLibrary;
use sitecache_core::{AppConfig, Error, Store};

use crate::articles::{self, GET_ARTICLE, GET_ARTICLES, UPDATE_ARTICLES};
use crate::error::ServerError;
use crate::params::Params;
use crate::sites::{CHECK_STORAGE, Site, Sites};

pub struct Dispatcher {
    store: Store,
    config: AppConfig,
    sites: Sites,
}

impl Dispatcher {
    pub fn new(store: Store, config: AppConfig) -> Self {
        Self { store, config, sites: Sites::new() }
    }

    /// Register `site` under its own name.
    pub fn with_site(mut self, site: Arc<dyn Site>) -> Self {
        self.sites.insert(site.name(), site);
        self
    }

    pub async fn exec(&self, site: &str, method: &str, params: &Params) -> Result<Json, ServerError> {
        tracing::debug!(site, method, "dispatching");

        if method == UPDATE_ARTICLES {
            let root = self.config.require_articles_path().map_err(Error::from)?;
            let session = self.store.session().await?;
            let written =
                articles::update_articles(&session, &ArticleLibrary::new(root), &self.sites, self.config.insert_batch_size)
                    .await?;
            tracing::info!(written, "articles updated");
            return Ok(Json::String("OK".into()));
        }

        let Some(handler) = self.sites.get(site) else {
            return Err(Error::NotFound(format!("Site {site} not found")).into());
        };

        match method {
            GET_ARTICLE => {
                let session = self.store.session().await?;
                Ok(serde_json::to_value(articles::get_article(&session, site, params).await?)?)
            }
            GET_ARTICLES => {
                let session = self.store.session().await?;
                Ok(serde_json::to_value(articles::get_articles(&session, site, params).await?)?)
            }
            m if !handler.supports(m) => Err(Error::Validation(format!("Unsupported method {m} of site {site}")).into()),
            _ => {
                let session = self.store.session().await?;
                let namespace = handler.check_storage(&session).await?;
                if method == CHECK_STORAGE {
                    Ok(Json::Null)
                } else {
                    handler.call(method, &namespace, params).await
                }
            }
        }
    }
}
