//! Upstream payloads and the resolved catalog records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry of `problems.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeProblem {
    pub id: String,
    pub name: String,
}

/// Entry of `problem-models.json`, keyed by problem id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NativeModel {
    #[serde(default)]
    pub difficulty: Option<f64>,
}

pub type NativeModels = HashMap<String, NativeModel>;

/// Entry of `contests.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeContest {
    pub id: String,
    pub title: String,
    pub start_epoch_second: i64,
    #[serde(default)]
    pub rate_change: String,
}

/// Entry of `contest-problem.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeContestProblem {
    pub contest_id: String,
    pub problem_id: String,
    pub problem_index: String,
}

/// A problem as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredProblem {
    pub id: String,
    pub title: String,
    /// Contest ids and titles the problem appears in, then its own id and name.
    pub search: String,
    pub link: Option<String>,
    pub difficulty: Option<i64>,
    /// Start of the earliest contest the problem appears in.
    pub date: DateTime<Utc>,
}

/// A contest as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredContest {
    pub id: String,
    pub title: String,
    pub search: String,
    pub link: Option<String>,
    pub category: String,
    pub date: DateTime<Utc>,
}

/// Membership of a problem in a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContestLink {
    pub cid: String,
    pub pid: String,
    pub index: String,
}

/// One catalog record, as handed to the refresh routine.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRecord {
    Problem(StoredProblem),
    Contest(StoredContest),
    Link(ContestLink),
}

/// The whole resolved catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub problems: Vec<StoredProblem>,
    pub contests: Vec<StoredContest>,
    pub links: Vec<ContestLink>,
}

impl Catalog {
    pub fn into_records(self) -> Vec<CatalogRecord> {
        self.problems
            .into_iter()
            .map(CatalogRecord::Problem)
            .chain(self.contests.into_iter().map(CatalogRecord::Contest))
            .chain(self.links.into_iter().map(CatalogRecord::Link))
            .collect()
    }

    pub fn from_records(records: Vec<CatalogRecord>) -> Self {
        let mut catalog = Catalog::default();
        for record in records {
            match record {
                CatalogRecord::Problem(p) => catalog.problems.push(p),
                CatalogRecord::Contest(c) => catalog.contests.push(c),
                CatalogRecord::Link(l) => catalog.links.push(l),
            }
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_payloads_deserialize() {
        let contests: Vec<NativeContest> = serde_json::from_str(
            r#"[{"id":"abc001","start_epoch_second":1381579200,"duration_second":7200,"title":"AtCoder Beginner Contest 001","rate_change":"-"}]"#,
        )
        .unwrap();
        assert_eq!(contests[0].rate_change, "-");

        let models: NativeModels = serde_json::from_str(
            r#"{"abc001_a":{"slope":-0.0007,"difficulty":-1074.5,"is_experimental":false},"abc001_b":{"slope":-0.0006}}"#,
        )
        .unwrap();
        assert_eq!(models["abc001_a"].difficulty, Some(-1074.5));
        assert_eq!(models["abc001_b"].difficulty, None);
    }

    #[test]
    fn test_records_partition() {
        let catalog = Catalog {
            links: vec![ContestLink { cid: "abc001".into(), pid: "abc001_a".into(), index: "A".into() }],
            ..Default::default()
        };
        assert_eq!(Catalog::from_records(catalog.clone().into_records()), catalog);
    }
}
