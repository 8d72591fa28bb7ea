//! Request parameters.
//!
//! One flat object serves every method; each method reads the fields it
//! understands and ignores the rest.

use serde::{Deserialize, Serialize};
use sitecache_core::{Error, QueryParams};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Params {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub max_difficulty: Option<i64>,
    pub min_difficulty: Option<i64>,
    /// `id`, `title` or `difficulty`, optionally followed by `desc`.
    pub order: Option<String>,
    /// Entity id an annotation belongs to.
    pub pid: Option<String>,
    /// Annotation kind.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Annotation id.
    pub aid: Option<String>,
}

impl Params {
    /// Listing parameters for problems.
    pub fn problem_query(&self) -> QueryParams {
        QueryParams {
            search: self.search.clone(),
            min: self.min_difficulty,
            max: self.max_difficulty,
            order: self.order.clone(),
            start: self.start,
            end: self.end,
            category: None,
        }
    }

    /// Listing parameters for contests.
    pub fn contest_query(&self) -> QueryParams {
        QueryParams {
            search: self.search.clone(),
            category: self.category.clone(),
            start: self.start,
            end: self.end,
            ..Default::default()
        }
    }

    /// Value of a required parameter.
    pub fn require<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str, Error> {
        match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(Error::Validation(format!("Missing parameter <{name}>"))),
        }
    }
}
