//! Externally curated annotations, shared by every namespace.
//!
//! Annotations live in two global relations created by migration:
//! `_annotations` (one row per annotation, keyed by site, entity id, kind and
//! annotation id) and `_annotation_tags` (zero or more tags per annotation).
//! Both are replaced wholesale whenever the library is re-imported.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Predicate, Relation, Session};
use crate::{Error, Value};

pub const ANNOTATIONS: &str = "_annotations";
pub const ANNOTATION_TAGS: &str = "_annotation_tags";

const COLUMNS: [&str; 11] = [
    "site",
    "pid",
    "kind",
    "id",
    "title",
    "author",
    "created",
    "updated_time",
    "updated_commit",
    "updated_commit_short",
    "rendered",
];

/// One annotation attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub site: String,
    /// Id of the annotated entity.
    pub pid: String,
    /// Single-letter subtype.
    pub kind: String,
    pub id: String,
    pub title: String,
    pub author: String,
    pub created: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
    pub updated_commit: String,
    pub updated_commit_short: String,
    /// Rendered body. Absent in listings.
    pub rendered: Option<String>,
    pub tags: Vec<String>,
}

fn required<'a>(what: &str, value: &'a str) -> Result<&'a str, Error> {
    if value.is_empty() {
        Err(Error::Validation(format!("Missing parameter <{what}>")))
    } else {
        Ok(value)
    }
}

fn scope(site: &str, pid: &str, kind: &str) -> Predicate {
    Predicate::eq("site", site.to_string())
        .and(Predicate::eq("pid", pid.to_string()))
        .and(Predicate::eq("kind", kind.to_string()))
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Replace every stored annotation and tag with `annotations`.
///
/// Returns the number of annotations written.
pub async fn replace_annotations(
    session: &Session, annotations: &[Annotation], batch_size: usize,
) -> Result<usize, Error> {
    let rows: Vec<Vec<Value>> = annotations
        .iter()
        .map(|a| {
            vec![
                Value::Text(a.site.clone()),
                Value::Text(a.pid.clone()),
                Value::Text(a.kind.clone()),
                Value::Text(a.id.clone()),
                Value::Text(a.title.clone()),
                Value::Text(a.author.clone()),
                Value::Integer(a.created.timestamp()),
                Value::Integer(a.updated_time.timestamp()),
                Value::Text(a.updated_commit.clone()),
                Value::Text(a.updated_commit_short.clone()),
                Value::Text(a.rendered.clone().unwrap_or_default()),
            ]
        })
        .collect();
    let tags: Vec<Vec<Value>> = annotations
        .iter()
        .flat_map(|a| {
            a.tags.iter().map(move |tag| {
                vec![
                    Value::Text(a.site.clone()),
                    Value::Text(a.pid.clone()),
                    Value::Text(a.kind.clone()),
                    Value::Text(a.id.clone()),
                    Value::Text(tag.clone()),
                ]
            })
        })
        .collect();

    let stored = Relation::global(session, ANNOTATIONS);
    let stored_tags = Relation::global(session, ANNOTATION_TAGS);
    stored.delete(None).await?;
    stored_tags.delete(None).await?;
    let written = stored.insert(&COLUMNS, rows, batch_size).await?;
    let tagged = stored_tags
        .insert(&["site", "pid", "kind", "id", "tag"], tags, batch_size)
        .await?;

    tracing::info!(annotations = written, tags = tagged, "annotations replaced");
    Ok(written)
}

/// Look up one annotation, including its rendered body.
pub async fn get_annotation(session: &Session, site: &str, pid: &str, kind: &str, id: &str) -> Result<Annotation, Error> {
    let pid = required("pid", pid)?;
    let kind = required("type", kind)?;
    let id = required("aid", id)?;

    let key = scope(site, pid, kind).and(Predicate::eq("id", id.to_string()));
    let found = Relation::global(session, ANNOTATIONS)
        .select(
            "title, author, created, updated_time, updated_commit, updated_commit_short, rendered",
            &format!("WHERE {}", key.clause),
            key.params.clone(),
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .await?;
    let Some((title, author, created, updated, commit, short, rendered)) = found.into_iter().next() else {
        return Err(Error::NotFound(format!("No annotation {site}/{pid}/{kind}/{id}")));
    };

    let tags = Relation::global(session, ANNOTATION_TAGS)
        .select("tag", &format!("WHERE {} ORDER BY rowid", key.clause), key.params, |row| row.get(0))
        .await?;

    Ok(Annotation {
        site: site.to_string(),
        pid: pid.to_string(),
        kind: kind.to_string(),
        id: id.to_string(),
        title,
        author,
        created: timestamp(created),
        updated_time: timestamp(updated),
        updated_commit: commit,
        updated_commit_short: short,
        rendered: Some(rendered),
        tags,
    })
}

/// All annotations of one kind on one entity, without rendered bodies.
pub async fn list_annotations(session: &Session, site: &str, pid: &str, kind: &str) -> Result<Vec<Annotation>, Error> {
    let pid = required("pid", pid)?;
    let kind = required("type", kind)?;
    let filter = scope(site, pid, kind);

    let rows = Relation::global(session, ANNOTATIONS)
        .select(
            "id, title, author, created, updated_time, updated_commit, updated_commit_short",
            &format!("WHERE {} ORDER BY created, id", filter.clause),
            filter.params.clone(),
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .await?;

    let tag_rows = Relation::global(session, ANNOTATION_TAGS)
        .select("id, tag", &format!("WHERE {} ORDER BY rowid", filter.clause), filter.params, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .await?;
    let mut tags: HashMap<String, Vec<String>> = HashMap::new();
    for (id, tag) in tag_rows {
        tags.entry(id).or_default().push(tag);
    }

    Ok(rows
        .into_iter()
        .map(|(id, title, author, created, updated, commit, short)| Annotation {
            site: site.to_string(),
            pid: pid.to_string(),
            kind: kind.to_string(),
            tags: tags.remove(&id).unwrap_or_default(),
            id,
            title,
            author,
            created: timestamp(created),
            updated_time: timestamp(updated),
            updated_commit: commit,
            updated_commit_short: short,
            rendered: None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    fn annotation(pid: &str, id: &str, tags: &[&str]) -> Annotation {
        Annotation {
            site: "atcoder".into(),
            pid: pid.into(),
            kind: "s".into(),
            id: id.into(),
            title: format!("Notes on {pid}"),
            author: "未知".into(),
            created: timestamp(1),
            updated_time: timestamp(1_700_000_000),
            updated_commit: "0123456789abcdef".into(),
            updated_commit_short: "0123456".into(),
            rendered: Some(format!("<p>{id}</p>")),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_get_annotation_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        let stored = annotation("abc001_a", "a1", &["dp", "greedy"]);
        replace_annotations(&session, std::slice::from_ref(&stored), 300).await.unwrap();

        let found = get_annotation(&session, "atcoder", "abc001_a", "s", "a1").await.unwrap();
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        let err = get_annotation(&session, "atcoder", "abc001_a", "s", "nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_parameters_rejected() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        assert!(matches!(
            get_annotation(&session, "atcoder", "abc001_a", "", "a1").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            list_annotations(&session, "atcoder", "", "s").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_groups_tags_and_omits_body() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        replace_annotations(
            &session,
            &[
                annotation("abc001_a", "a1", &["dp"]),
                annotation("abc001_a", "a2", &[]),
                annotation("abc001_b", "b1", &["math"]),
            ],
            2,
        )
        .await
        .unwrap();

        let listed = list_annotations(&session, "atcoder", "abc001_a", "s").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a1");
        assert_eq!(listed[0].tags, vec!["dp".to_string()]);
        assert!(listed[1].tags.is_empty());
        assert!(listed.iter().all(|a| a.rendered.is_none()));
    }

    #[tokio::test]
    async fn test_replace_drops_previous_import() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        replace_annotations(&session, &[annotation("abc001_a", "a1", &["dp"])], 300).await.unwrap();
        replace_annotations(&session, &[annotation("abc002_a", "x1", &[])], 300).await.unwrap();

        assert!(list_annotations(&session, "atcoder", "abc001_a", "s").await.unwrap().is_empty());
        assert_eq!(Relation::global(&session, ANNOTATION_TAGS).count().await.unwrap(), 0);
    }
}
