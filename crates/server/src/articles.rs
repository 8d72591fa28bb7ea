//! Article methods: import the library, read single articles and listings.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitecache_client::ArticleLibrary;
use sitecache_core::annotations::{self, Annotation};
use sitecache_core::{Error, Namespace, Session, Source, aggregate};

use crate::params::Params;
use crate::sites::Sites;

pub const UPDATE_ARTICLES: &str = "updateArticles";
pub const GET_ARTICLE: &str = "getArticle";
pub const GET_ARTICLES: &str = "getArticles";

const COMMIT_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastCommit {
    pub id: String,
    pub short: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub site: String,
    pub pid: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    pub last_commit: LastCommit,
    pub author: String,
    pub title: String,
    pub tags: Vec<String>,
}

fn commit_date(time: DateTime<Utc>) -> String {
    time.format(COMMIT_DATE_FORMAT).to_string()
}

impl From<Annotation> for ArticleView {
    fn from(a: Annotation) -> Self {
        Self {
            last_commit: LastCommit { id: a.updated_commit, short: a.updated_commit_short, date: commit_date(a.updated_time) },
            site: a.site,
            pid: a.pid,
            id: a.id,
            kind: a.kind,
            rendered: a.rendered,
            author: a.author,
            title: a.title,
            tags: a.tags,
        }
    }
}

/// Re-import every site of `library`.
///
/// Counters go to the namespace of each registered site. Sites present in
/// the library but not registered keep their annotations and lose their
/// counters. All annotations are replaced at once. Returns the number of
/// annotations written.
pub async fn update_articles(
    session: &Session, library: &ArticleLibrary, sites: &Sites, batch_size: usize,
) -> Result<usize, Error> {
    let mut collected = Vec::new();

    for name in library.sites().await? {
        let articles = library.site(&name);
        match sites.get(name.as_str()) {
            Some(site) => {
                let namespace = Namespace::ensure(session, site.name(), site.version()).await?;
                let counters = articles.fetch_side_metadata().await?;
                aggregate::replace_counters(&namespace, &counters, batch_size).await?;
            }
            None => tracing::warn!(site = %name, "articles for unregistered site, counters skipped"),
        }
        collected.extend(articles.fetch_catalog().await?);
    }

    annotations::replace_annotations(session, &collected, batch_size).await
}

pub async fn get_article(session: &Session, site: &str, params: &Params) -> Result<ArticleView, Error> {
    let pid = Params::require("pid", &params.pid)?;
    let kind = Params::require("type", &params.kind)?;
    let aid = Params::require("aid", &params.aid)?;
    Ok(annotations::get_annotation(session, site, pid, kind, aid).await?.into())
}

pub async fn get_articles(session: &Session, site: &str, params: &Params) -> Result<Vec<ArticleView>, Error> {
    let pid = Params::require("pid", &params.pid)?;
    let kind = Params::require("type", &params.kind)?;
    Ok(annotations::list_annotations(session, site, pid, kind)
        .await?
        .into_iter()
        .map(ArticleView::from)
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use sitecache_core::{Counters, Store};
    use tempfile::TempDir;

    use crate::sites::Site;
    use crate::sites::atcoder::tests::site;

    async fn write(path: PathBuf, body: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, body).await.unwrap();
    }

    /// Library with one article on `abc001_a` and one site nobody serves.
    pub(crate) async fn library() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root.join("list.json"), r#"{"atcoder": {}, "elsewhere": {}}"#).await;
        write(root.join("atcoder/list.json"), r#"{"abc001_a": [1, 1]}"#).await;
        write(
            root.join("atcoder/abc001_a/list.json"),
            r#"{"solution": [{"id": "s1", "title": "Greedy", "tags": ["greedy", "math"], "author": "kid",
                "created": "2023-05-01T12:00:00Z",
                "lastCommit": {"id": "abcdef0123", "short": "abcdef0", "date": "2023-05-02T08:00:00Z"}}]}"#,
        )
        .await;
        write(root.join("atcoder/abc001_a/solution/s1/data.json"), r#"{"rendered": "<p>s1</p>"}"#).await;
        write(root.join("elsewhere/list.json"), r#"{"x1": [4, 0]}"#).await;
        write(root.join("elsewhere/x1/list.json"), r#"{}"#).await;
        dir
    }

    pub(crate) fn sites() -> Sites {
        let atcoder: Arc<dyn Site> = Arc::new(site());
        [(atcoder.name(), atcoder)].into_iter().collect()
    }

    #[test]
    fn test_commit_date_format() {
        let time = DateTime::from_timestamp(1683014400, 0).unwrap();
        assert_eq!(commit_date(time), "Tue, 02 May 2023 08:00:00 GMT");
    }

    #[tokio::test]
    async fn test_update_articles_and_read_back() {
        let dir = library().await;
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        let sites = sites();

        let written = update_articles(&session, &ArticleLibrary::new(dir.path()), &sites, 300).await.unwrap();
        assert_eq!(written, 1);

        let ns = Namespace::ensure(&session, "atcoder", sites["atcoder"].version()).await.unwrap();
        let counters = aggregate::counters_in(&ns, "SELECT 'abc001_a'", vec![]).await.unwrap();
        assert_eq!(counters.get("abc001_a"), Some(&Counters(1, 1)));

        let params = Params {
            pid: Some("abc001_a".into()),
            kind: Some("s".into()),
            aid: Some("s1".into()),
            ..Default::default()
        };
        let article = get_article(&session, "atcoder", &params).await.unwrap();
        assert_eq!(article.rendered.as_deref(), Some("<p>s1</p>"));
        assert_eq!(article.last_commit.date, "Tue, 02 May 2023 08:00:00 GMT");
        assert_eq!(article.tags, vec!["greedy".to_string(), "math".to_string()]);

        let listing = get_articles(&session, "atcoder", &params).await.unwrap();
        assert_eq!(listing.len(), 1);
        let json = serde_json::to_value(&listing[0]).unwrap();
        assert!(json.get("rendered").is_none());
        assert_eq!(json["type"], "s");
        assert_eq!(json["lastCommit"]["short"], "abcdef0");
    }

    #[tokio::test]
    async fn test_article_errors() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();

        let missing = Params { pid: Some("abc001_a".into()), ..Default::default() };
        let err = get_article(&session, "atcoder", &missing).await.unwrap_err();
        assert_eq!(err.to_string(), "VALIDATION_ERROR: Missing parameter <type>");

        let absent = Params {
            pid: Some("abc001_a".into()),
            kind: Some("s".into()),
            aid: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(get_article(&session, "atcoder", &absent).await, Err(Error::NotFound(_))));
        assert!(get_articles(&session, "atcoder", &absent).await.unwrap().is_empty());
    }
}
