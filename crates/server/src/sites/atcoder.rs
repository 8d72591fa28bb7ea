//! The `atcoder` site: problems, contests and their membership.
//!
//! ### Relations
//!
//! - `problemset`: one row per problem, full-text indexed on `search`
//! - `contestset`: one row per contest, full-text indexed on `search`
//! - `contestproblem`: which problem sits at which index of which contest
//!
//! All three are replaced together by the refresh routine.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as Json;
use sitecache_client::{Catalog, CatalogRecord};
use sitecache_core::aggregate::{self, Counters};
use sitecache_core::store::{Clause, Column, Relation, RelationSpec};
use sitecache_core::{Error, Listing, Namespace, RefreshPolicy, RefreshRoutine, Session, Source, Value};

use super::Site;
use super::difficulty::{self, Difficulty};
use crate::error::ServerError;
use crate::params::Params;

pub const NAME: &str = "atcoder";

/// Bumping this drops and rebuilds every relation of the namespace.
pub const VERSION: &str = "v1013";

pub const GET_PROBLEMS: &str = "getProblems";
pub const GET_CONTESTS: &str = "getContests";

const PROBLEMSET: &str = "problemset";
const CONTESTSET: &str = "contestset";
const CONTESTPROBLEM: &str = "contestproblem";

pub fn problemset_spec() -> RelationSpec {
    RelationSpec::new(
        PROBLEMSET,
        vec![
            Column::text("id").primary_key(),
            Column::text("title"),
            Column::text("search"),
            Column::text("link").nullable(),
            Column::integer("difficulty").nullable(),
            Column::timestamp("date"),
        ],
    )
    .with_clause(Clause::FullText("search".into()))
}

pub fn contestset_spec() -> RelationSpec {
    RelationSpec::new(
        CONTESTSET,
        vec![
            Column::text("id").primary_key(),
            Column::text("title"),
            Column::text("search"),
            Column::text("link").nullable(),
            Column::text("category"),
            Column::timestamp("date"),
        ],
    )
    .with_clause(Clause::FullText("search".into()))
    .with_clause(Clause::Index(vec!["category".into()]))
}

pub fn contestproblem_spec() -> RelationSpec {
    RelationSpec::new(
        CONTESTPROBLEM,
        vec![Column::text("cid"), Column::text("pid"), Column::text("index")],
    )
    .with_clause(Clause::Index(vec!["cid".into()]))
}

fn problem_listing(relation: &Relation<'_>) -> Listing {
    Listing::of(relation, &problemset_spec())
        .recency("date")
        .range("difficulty")
        .sortable(&["id", "title", "difficulty"])
}

fn contest_listing(relation: &Relation<'_>) -> Listing {
    Listing::of(relation, &contestset_spec()).recency("date").category("category")
}

fn text(value: Option<String>) -> Value {
    value.map(Value::Text).unwrap_or(Value::Null)
}

/// A stored difficulty of zero is shown as none.
fn shown_difficulty(stored: Option<i64>) -> Option<Difficulty> {
    stored.filter(|d| *d != 0).map(difficulty::resolve)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub articles: Counters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContestProblem {
    pub index: String,
    pub problem: Problem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contest {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub problems: Vec<ContestProblem>,
}

/// The `atcoder` site, refreshed from `source`.
pub struct AtCoder<S> {
    source: S,
    policy: RefreshPolicy,
    batch_size: usize,
}

impl<S> AtCoder<S>
where
    S: Source<Record = CatalogRecord>,
{
    pub fn new(source: S, policy: RefreshPolicy, batch_size: usize) -> Self {
        Self { source, policy, batch_size }
    }

    /// Problems matching the listing parameters, with their counters.
    pub async fn get_problems(&self, namespace: &Namespace<'_>, params: &Params) -> Result<Vec<Problem>, Error> {
        let problemset = namespace.relation(PROBLEMSET)?;
        let compiled = problem_listing(&problemset).compile(&params.problem_query())?;

        let rows = problemset
            .select("id, title, link, difficulty", &compiled.clause, compiled.params.clone(), |row| {
                Ok(Problem {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    link: row.get(2)?,
                    difficulty: shown_difficulty(row.get(3)?),
                    articles: Counters::default(),
                })
            })
            .await?;
        let counters = aggregate::counters_for(namespace, &compiled).await?;

        Ok(aggregate::attach(rows, &counters, |p| p.id.as_str())
            .into_iter()
            .map(|(problem, articles)| Problem { articles, ..problem })
            .collect())
    }

    /// Contests matching the listing parameters, each with its problems.
    ///
    /// Problems and counters are fetched with one query each, scoped to the
    /// ids of the selected contests.
    pub async fn get_contests(&self, namespace: &Namespace<'_>, params: &Params) -> Result<Vec<Contest>, Error> {
        let contestset = namespace.relation(CONTESTSET)?;
        let compiled = contest_listing(&contestset).compile(&params.contest_query())?;

        let contests = contestset
            .select("id, title, link", &compiled.clause, compiled.params.clone(), |row| {
                Ok(Contest { id: row.get(0)?, title: row.get(1)?, link: row.get(2)?, problems: Vec::new() })
            })
            .await?;

        let members = namespace.relation(CONTESTPROBLEM)?;
        let problemset = namespace.relation(PROBLEMSET)?;
        let (cp, p) = (members.quoted(), problemset.quoted());
        let scope = format!("{cp}.\"cid\" IN ({})", compiled.id_subquery());

        let rows = members
            .select(
                &format!("{cp}.\"cid\", {cp}.\"index\", {p}.\"id\", {p}.\"title\", {p}.\"link\", {p}.\"difficulty\""),
                &format!("JOIN {p} ON {p}.\"id\" = {cp}.\"pid\" WHERE {scope} ORDER BY {cp}.rowid"),
                compiled.params.clone(),
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        ContestProblem {
                            index: row.get(1)?,
                            problem: Problem {
                                id: row.get(2)?,
                                title: row.get(3)?,
                                link: row.get(4)?,
                                difficulty: shown_difficulty(row.get(5)?),
                                articles: Counters::default(),
                            },
                        },
                    ))
                },
            )
            .await?;
        let counters = aggregate::counters_in(
            namespace,
            &format!("SELECT {cp}.\"pid\" FROM {cp} WHERE {scope}"),
            compiled.params.clone(),
        )
        .await?;

        let mut by_contest: HashMap<String, Vec<ContestProblem>> = HashMap::new();
        for (cid, mut member) in rows {
            member.problem.articles = aggregate::lookup(&counters, &member.problem.id);
            by_contest.entry(cid).or_default().push(member);
        }

        Ok(contests
            .into_iter()
            .map(|mut contest| {
                contest.problems = by_contest.remove(&contest.id).unwrap_or_default();
                contest
            })
            .collect())
    }
}

#[async_trait]
impl<S> RefreshRoutine for AtCoder<S>
where
    S: Source<Record = CatalogRecord>,
{
    async fn refresh(&self, namespace: &Namespace<'_>) -> Result<(), Error> {
        let catalog = Catalog::from_records(self.source.fetch_catalog().await?);

        let problems = catalog
            .problems
            .into_iter()
            .map(|p| {
                vec![
                    Value::Text(p.id),
                    Value::Text(p.title),
                    Value::Text(p.search),
                    text(p.link),
                    p.difficulty.map(Value::Integer).unwrap_or(Value::Null),
                    Value::Integer(p.date.timestamp()),
                ]
            })
            .collect();
        let contests = catalog
            .contests
            .into_iter()
            .map(|c| {
                vec![
                    Value::Text(c.id),
                    Value::Text(c.title),
                    Value::Text(c.search),
                    text(c.link),
                    Value::Text(c.category),
                    Value::Integer(c.date.timestamp()),
                ]
            })
            .collect();
        let links = catalog
            .links
            .into_iter()
            .map(|l| vec![Value::Text(l.cid), Value::Text(l.pid), Value::Text(l.index)])
            .collect();

        let problemset = namespace.relation(PROBLEMSET)?;
        let contestset = namespace.relation(CONTESTSET)?;
        let contestproblem = namespace.relation(CONTESTPROBLEM)?;
        problemset.delete(None).await?;
        contestset.delete(None).await?;
        contestproblem.delete(None).await?;

        let columns = ["id", "title", "search", "link", "difficulty", "date"];
        let p = problemset.insert(&columns, problems, self.batch_size).await?;
        let columns = ["id", "title", "search", "link", "category", "date"];
        let c = contestset.insert(&columns, contests, self.batch_size).await?;
        let l = contestproblem
            .insert(&["cid", "pid", "index"], links, self.batch_size)
            .await?;

        tracing::info!(namespace = %namespace.name(), problems = p, contests = c, links = l, "catalog replaced");
        Ok(())
    }
}

#[async_trait]
impl<S> Site for AtCoder<S>
where
    S: Source<Record = CatalogRecord>,
{
    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn methods(&self) -> &'static [&'static str] {
        &[GET_PROBLEMS, GET_CONTESTS]
    }

    async fn check_storage<'s>(&self, session: &'s Session) -> Result<Namespace<'s>, Error> {
        let namespace = Namespace::ensure(session, NAME, VERSION).await?;
        for spec in [problemset_spec(), contestset_spec(), contestproblem_spec()] {
            namespace.ensure_relation(&spec).await?;
        }
        let outcome = namespace.maybe_refresh(&self.policy, self).await?;
        tracing::debug!(namespace = NAME, ?outcome, "storage checked");
        Ok(namespace)
    }

    async fn call(&self, method: &str, namespace: &Namespace<'_>, params: &Params) -> Result<Json, ServerError> {
        match method {
            GET_PROBLEMS => Ok(serde_json::to_value(self.get_problems(namespace, params).await?)?),
            GET_CONTESTS => Ok(serde_json::to_value(self.get_contests(namespace, params).await?)?),
            _ => Err(Error::Validation(format!("Unsupported method {method} of site {NAME}")).into()),
        }
    }
}
