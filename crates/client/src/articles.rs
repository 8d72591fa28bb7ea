//! Filesystem article library.
//!
//! ### Layout
//!
//! ```text
//! <root>/list.json                          {"<site>": <commit>, ...}
//! <root>/<site>/list.json                   {"<pid>": [t, s], ...}
//! <root>/<site>/<pid>/list.json             {"<type>": [<article>, ...], ...}
//! <root>/<site>/<pid>/<type>/<id>/data.json {"rendered": "..."}
//! ```
//!
//! Per-site counters become side-metadata; articles become annotations whose
//! kind is the first letter of their type directory.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sitecache_core::{Annotation, Counters, Error, Source};

use crate::atcoder::resolve::epoch_floor;
use crate::error::ClientError;

/// Author recorded when an article names none.
pub const UNKNOWN_AUTHOR: &str = "未知";

#[derive(Debug, Clone, Deserialize)]
struct CommitInfo {
    id: String,
    short: String,
    date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleEntry {
    id: String,
    title: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created: Option<String>,
    last_commit: CommitInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct ArticleBody {
    rendered: String,
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ClientError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(format!("{}: {e}", path.display())))
}

/// Parse an article date, accepting RFC 3339 and RFC 2822.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, ClientError> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ClientError::Parse(format!("date '{value}': {e}")))
}

/// Root of an article library.
#[derive(Debug, Clone)]
pub struct ArticleLibrary {
    root: PathBuf,
}

impl ArticleLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Sites present in the library.
    pub async fn sites(&self) -> Result<Vec<String>, ClientError> {
        let sites: BTreeMap<String, serde_json::Value> = read_json(&self.root.join("list.json")).await?;
        Ok(sites.into_keys().collect())
    }

    /// Articles of one site.
    pub fn site(&self, site: &str) -> SiteArticles {
        SiteArticles { root: self.root.join(site), site: site.to_string() }
    }
}

/// Articles and counters of one site.
#[derive(Debug, Clone)]
pub struct SiteArticles {
    root: PathBuf,
    site: String,
}

impl SiteArticles {
    pub fn name(&self) -> &str {
        &self.site
    }

    /// Counter pairs keyed by entity id.
    pub async fn counters(&self) -> Result<HashMap<String, Counters>, ClientError> {
        let raw: BTreeMap<String, (i64, i64)> = read_json(&self.root.join("list.json")).await?;
        Ok(raw.into_iter().map(|(pid, (t, s))| (pid, Counters(t, s))).collect())
    }

    /// Every article of the site, with rendered bodies.
    pub async fn annotations(&self) -> Result<Vec<Annotation>, ClientError> {
        let pids: BTreeMap<String, (i64, i64)> = read_json(&self.root.join("list.json")).await?;
        let mut annotations = Vec::new();

        for pid in pids.keys() {
            let dir = self.root.join(pid);
            let by_type: BTreeMap<String, Vec<ArticleEntry>> = read_json(&dir.join("list.json")).await?;
            for (kind, entries) in by_type {
                for entry in entries {
                    let body: ArticleBody = read_json(&dir.join(&kind).join(&entry.id).join("data.json")).await?;
                    annotations.push(self.annotation(pid, &kind, entry, body)?);
                }
            }
        }

        tracing::debug!(site = %self.site, annotations = annotations.len(), "articles read");
        Ok(annotations)
    }

    fn annotation(&self, pid: &str, kind: &str, entry: ArticleEntry, body: ArticleBody) -> Result<Annotation, ClientError> {
        let created = match entry.created.as_deref() {
            Some(created) => parse_date(created)?,
            None => epoch_floor(),
        };
        Ok(Annotation {
            site: self.site.clone(),
            pid: pid.to_string(),
            kind: kind.chars().next().map(String::from).unwrap_or_default(),
            id: entry.id,
            title: entry.title,
            author: entry.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            created,
            updated_time: parse_date(&entry.last_commit.date)?,
            updated_commit: entry.last_commit.id,
            updated_commit_short: entry.last_commit.short,
            rendered: Some(body.rendered),
            tags: entry.tags,
        })
    }
}

#[async_trait]
impl Source for SiteArticles {
    type Record = Annotation;

    async fn fetch_catalog(&self) -> Result<Vec<Annotation>, Error> {
        Ok(self.annotations().await?)
    }

    async fn fetch_side_metadata(&self) -> Result<HashMap<String, Counters>, Error> {
        Ok(self.counters().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(path: PathBuf, body: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, body).await.unwrap();
    }

    async fn library() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root.join("list.json"), r#"{"atcoder": {"id": "c0", "short": "c0", "date": "2024-01-01T00:00:00Z"}}"#).await;
        write(root.join("atcoder/list.json"), r#"{"abc001_a": [2, 1]}"#).await;
        write(
            root.join("atcoder/abc001_a/list.json"),
            r#"{"solution": [
                {"id": "s1", "title": "Greedy", "tags": ["greedy"], "author": "kid",
                 "created": "2023-05-01T12:00:00Z",
                 "lastCommit": {"id": "abcdef0123", "short": "abcdef0", "date": "Tue, 02 May 2023 08:00:00 GMT"}},
                {"id": "s2", "title": "Brute force",
                 "lastCommit": {"id": "0123abcdef", "short": "0123abc", "date": "2023-05-03T00:00:00Z"}}
            ]}"#,
        )
        .await;
        write(root.join("atcoder/abc001_a/solution/s1/data.json"), r#"{"rendered": "<p>s1</p>"}"#).await;
        write(root.join("atcoder/abc001_a/solution/s2/data.json"), r#"{"rendered": "<p>s2</p>"}"#).await;
        dir
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2023-05-01T12:00:00Z").unwrap().timestamp(), 1682942400);
        assert_eq!(parse_date("Mon, 01 May 2023 12:00:00 GMT").unwrap().timestamp(), 1682942400);
        assert!(parse_date("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_reads_sites_and_counters() {
        let dir = library().await;
        let root = dir.path();
        let lib = ArticleLibrary::new(root);
        assert_eq!(lib.sites().await.unwrap(), vec!["atcoder".to_string()]);

        let site = lib.site("atcoder");
        let counters = site.fetch_side_metadata().await.unwrap();
        assert_eq!(counters.get("abc001_a"), Some(&Counters(2, 1)));
    }

    #[tokio::test]
    async fn test_reads_annotations_with_defaults() {
        let dir = library().await;
        let root = dir.path();
        let annotations = ArticleLibrary::new(root).site("atcoder").annotations().await.unwrap();

        assert_eq!(annotations.len(), 2);
        let first = &annotations[0];
        assert_eq!(first.kind, "s");
        assert_eq!(first.author, "kid");
        assert_eq!(first.tags, vec!["greedy".to_string()]);
        assert_eq!(first.rendered.as_deref(), Some("<p>s1</p>"));
        assert_eq!(first.updated_time.timestamp(), 1683014400);

        let second = &annotations[1];
        assert_eq!(second.author, UNKNOWN_AUTHOR);
        assert_eq!(second.created, epoch_floor());
        assert!(second.tags.is_empty());
    }

    #[tokio::test]
    async fn test_missing_document_is_refresh_error() {
        let dir = library().await;
        let root = dir.path();
        tokio::fs::remove_file(root.join("atcoder/abc001_a/solution/s2/data.json")).await.unwrap();
        let err = ArticleLibrary::new(root).site("atcoder").fetch_catalog().await.unwrap_err();
        assert_eq!(err.code(), "REFRESH_FAILED");
    }
}
