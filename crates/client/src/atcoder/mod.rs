//! Catalog client for the AtCoder problem archive.
//!
//! ### Resources
//!
//! Four JSON documents under a configurable base URL:
//!
//! - `problems.json`: problem ids and names
//! - `problem-models.json`: estimated difficulty per problem
//! - `contests.json`: contests with start time and rated range
//! - `contest-problem.json`: which problem appears in which contest
//!
//! They are fetched one after another and resolved into a [`Catalog`] by the
//! pure functions in [`resolve`].

pub mod resolve;
pub mod types;

pub use types::{Catalog, CatalogRecord, ContestLink, StoredContest, StoredProblem};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header;
use serde::de::DeserializeOwned;
use url::Url;
use sitecache_core::{Error, Source};

use crate::error::ClientError;
use types::{NativeContest, NativeContestProblem, NativeModels, NativeProblem};

/// Default base URL of the archive resources.
const DEFAULT_BASE_URL: &str = "https://kenkoooo.com/atcoder/resources";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "sitecache/0.1";

/// Catalog client configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL (default: https://kenkoooo.com/atcoder/resources).
    pub base_url: String,
    /// Request timeout (default: 20s).
    pub timeout: Duration,
    /// User-agent string (default: sitecache/0.x).
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn from_app(config: &sitecache_core::AppConfig) -> Self {
        Self {
            base_url: config.source_base_url.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// HTTP client for the archive resources.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base: Url,
}

impl CatalogClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CatalogConfig) -> Result<Self, ClientError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", config.base_url)))?;

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, base })
    }

    /// URL of one resource document.
    pub fn resource_url(&self, name: &str) -> Result<Url, ClientError> {
        self.base
            .join(name)
            .map_err(|e| ClientError::InvalidUrl(format!("{name}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, ClientError> {
        let url = self.resource_url(name)?;
        let start = Instant::now();
        tracing::debug!(url = %url, "fetching catalog resource");

        let response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http { status: status.as_u16(), url: url.to_string() });
        }

        let bytes = response.bytes().await?;
        let parsed = serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(format!("{name}: {e}")))?;
        tracing::debug!(url = %url, bytes = bytes.len(), elapsed = ?start.elapsed(), "catalog resource fetched");
        Ok(parsed)
    }

    /// Fetch and resolve the whole catalog.
    pub async fn catalog(&self) -> Result<Catalog, ClientError> {
        let mut problems = resolve::resolve_problems(self.get_json::<Vec<NativeProblem>>("problems.json").await?);
        resolve::apply_difficulties(&mut problems, &self.get_json::<NativeModels>("problem-models.json").await?);
        let contests = resolve::resolve_contests(self.get_json::<Vec<NativeContest>>("contests.json").await?);
        let links = self.get_json::<Vec<NativeContestProblem>>("contest-problem.json").await?;

        let catalog = resolve::link_problems(problems, contests, links);
        tracing::info!(
            problems = catalog.problems.len(),
            contests = catalog.contests.len(),
            links = catalog.links.len(),
            "catalog resolved"
        );
        Ok(catalog)
    }
}

#[async_trait]
impl Source for CatalogClient {
    type Record = CatalogRecord;

    async fn fetch_catalog(&self) -> Result<Vec<CatalogRecord>, Error> {
        Ok(self.catalog().await?.into_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/resources")
    }

    fn client(base_url: String) -> CatalogClient {
        CatalogClient::new(CatalogConfig { base_url, timeout: Duration::from_secs(5), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_resource_url_keeps_base_path() {
        let c = client("https://kenkoooo.com/atcoder/resources".into());
        assert_eq!(
            c.resource_url("problems.json").unwrap().as_str(),
            "https://kenkoooo.com/atcoder/resources/problems.json"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = CatalogClient::new(CatalogConfig { base_url: "not a url".into(), ..Default::default() }).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_get_json_parses_body() {
        let base = serve_once("200 OK", r#"[{"id":"abc001_a","contest_id":"abc001","name":"Test"}]"#).await;
        let problems: Vec<NativeProblem> = client(base).get_json("problems.json").await.unwrap();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].name, "Test");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let base = serve_once("503 Service Unavailable", "{}").await;
        let err = client(base).get_json::<Vec<NativeProblem>>("problems.json").await.unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_failure_surfaces_as_refresh_error() {
        let base = serve_once("200 OK", "not json").await;
        let err = client(base).fetch_catalog().await.unwrap_err();
        assert_eq!(err.code(), "REFRESH_FAILED");
    }
}
