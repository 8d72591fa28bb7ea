//! Query compilation.
//!
//! List requests arrive as a loose [`QueryParams`] value. Compiling one
//! against a [`Listing`] happens in two steps:
//!
//! 1. [`Listing::plan`] normalizes the parameters into a [`Plan`], an
//!    ordered list of tagged filter and ordering terms
//! 2. [`Plan::render`] turns the plan into clause text and the matching
//!    positional parameters in one pass, so text and values cannot drift
//!
//! Ordering precedence, highest first: the caller's custom order, full-text
//! relevance, recency, then the natural id tie-break (non-numeric prefix,
//! then numeric suffix as an integer).

use serde::{Deserialize, Serialize};

use crate::store::ident::{self, quote};
use crate::store::{Relation, RelationSpec};
use crate::{Error, Value};

/// Lower bound used when only `max` is given.
pub const RANGE_MIN: i64 = i64::MIN;
/// Upper bound used when only `min` is given.
pub const RANGE_MAX: i64 = i64::MAX;
/// Row count used when no window end is given.
pub const UNBOUNDED_ROWS: i64 = 2_147_483_647;

/// Raw list parameters as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub search: Option<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    /// `"<column>"`, `"<column> asc"` or `"<column> desc"`.
    pub order: Option<String>,
    pub category: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

/// One filter term. Terms are conjoined in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Full-text match against the listing's index.
    Matches { query: String },
    /// Closed interval on a numeric column.
    Between { column: String, min: i64, max: i64 },
    Equals { column: String, value: String },
}

/// One ordering term. Earlier terms take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Column { column: String, descending: bool },
    /// Full-text relevance, most relevant first.
    Relevance { query: String },
    /// Newest first.
    Recency { column: String },
    NaturalPrefix { column: String },
    NaturalNumber { column: String },
}

/// Normalized query: what to filter, how to order, which window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub offset: i64,
    pub limit: i64,
}

/// Rendered query fragment plus its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    table: String,
    id_column: String,
    /// `WHERE ... ORDER BY ... LIMIT ... OFFSET ...`, ready to follow `FROM <table>`.
    pub clause: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    /// `SELECT <id> FROM <table> <clause>`, bound with the same [`params`](Self::params).
    pub fn id_subquery(&self) -> String {
        format!("SELECT {}.{} FROM {} {}", quote(&self.table), quote(&self.id_column), quote(&self.table), self.clause)
    }
}

/// Turn free text into an FTS5 query matching any of its words.
///
/// Returns `None` when the text has no searchable words.
pub fn fulltext_query(search: &str) -> Option<String> {
    let tokens: Vec<String> = search
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if tokens.is_empty() { None } else { Some(tokens.join(" OR ")) }
}

/// What a relation can be listed by.
#[derive(Debug, Clone)]
pub struct Listing {
    table: String,
    fulltext: Option<String>,
    columns: Vec<String>,
    id_column: String,
    recency_column: Option<String>,
    range_column: Option<String>,
    category_column: Option<String>,
    sortable: Vec<String>,
}

impl Listing {
    /// Listing over `relation`, whose schema is `spec`.
    ///
    /// Full-text search is available when the spec carries a full-text
    /// clause. The id column defaults to `id`.
    pub fn of(relation: &Relation<'_>, spec: &RelationSpec) -> Self {
        let table = relation.table().to_string();
        Self {
            fulltext: spec.fulltext_column().map(|_| ident::fulltext_table(&table)),
            table,
            columns: spec.columns.iter().map(|c| c.name.clone()).collect(),
            id_column: "id".into(),
            recency_column: None,
            range_column: None,
            category_column: None,
            sortable: Vec::new(),
        }
    }

    pub fn id(mut self, column: &str) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn recency(mut self, column: &str) -> Self {
        self.recency_column = Some(column.into());
        self
    }

    pub fn range(mut self, column: &str) -> Self {
        self.range_column = Some(column.into());
        self
    }

    pub fn category(mut self, column: &str) -> Self {
        self.category_column = Some(column.into());
        self
    }

    pub fn sortable(mut self, columns: &[&str]) -> Self {
        self.sortable = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Quoted table name, for callers joining against this listing.
    pub fn quoted_table(&self) -> String {
        quote(&self.table)
    }

    fn check_column(&self, column: &str) -> Result<(), Error> {
        if self.columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(Error::Validation(format!("'{}' has no column '{column}'", self.table)))
        }
    }

    fn parse_order(&self, order: &str) -> Result<Order, Error> {
        let mut parts = order.split_whitespace();
        let column = parts.next().unwrap_or_default();
        let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => return Err(Error::Validation(format!("Invalid order direction '{other}'"))),
        };
        if parts.next().is_some() || !self.sortable.iter().any(|c| c == column) {
            return Err(Error::Validation(format!("Invalid order '{order}'")));
        }
        Ok(Order::Column { column: column.to_string(), descending })
    }

    /// Normalize `params` into a plan.
    pub fn plan(&self, params: &QueryParams) -> Result<Plan, Error> {
        self.check_column(&self.id_column)?;

        let mut filters = Vec::new();
        let mut order = Vec::new();

        let search = params.search.as_deref().and_then(fulltext_query);
        if let Some(query) = &search {
            if self.fulltext.is_none() {
                return Err(Error::Validation(format!("'{}' does not support search", self.table)));
            }
            filters.push(Filter::Matches { query: query.clone() });
        }

        if params.min.is_some() || params.max.is_some() {
            let column = self
                .range_column
                .clone()
                .ok_or_else(|| Error::Validation(format!("'{}' does not support range filters", self.table)))?;
            self.check_column(&column)?;
            filters.push(Filter::Between {
                column,
                min: params.min.unwrap_or(RANGE_MIN),
                max: params.max.unwrap_or(RANGE_MAX),
            });
        }

        if let Some(value) = &params.category {
            let column = self
                .category_column
                .clone()
                .ok_or_else(|| Error::Validation(format!("'{}' does not support category filters", self.table)))?;
            self.check_column(&column)?;
            filters.push(Filter::Equals { column, value: value.clone() });
        }

        if let Some(custom) = &params.order {
            order.push(self.parse_order(custom)?);
        }
        if let Some(query) = search {
            order.push(Order::Relevance { query });
        }
        if let Some(column) = &self.recency_column {
            self.check_column(column)?;
            order.push(Order::Recency { column: column.clone() });
        }
        order.push(Order::NaturalPrefix { column: self.id_column.clone() });
        order.push(Order::NaturalNumber { column: self.id_column.clone() });

        let offset = params.start.unwrap_or(0);
        if offset < 0 {
            return Err(Error::Validation(format!("Invalid window start {offset}")));
        }
        // An end of zero leaves the window open.
        let limit = match params.end.filter(|end| *end != 0) {
            Some(end) if end < offset => {
                return Err(Error::Validation(format!("Invalid window: end {end} before start {offset}")));
            }
            Some(end) => end - offset,
            None => UNBOUNDED_ROWS,
        };

        Ok(Plan { filters, order, offset, limit })
    }

    /// Plan and render in one step.
    pub fn compile(&self, params: &QueryParams) -> Result<CompiledQuery, Error> {
        Ok(self.plan(params)?.render(self))
    }
}

impl Plan {
    /// Render this plan against `listing`.
    ///
    /// Parameters are emitted in the order their placeholders appear: filter
    /// terms first, then ordering terms.
    pub fn render(&self, listing: &Listing) -> CompiledQuery {
        let t = quote(&listing.table);
        let col = |c: &str| format!("{t}.{}", quote(c));
        let fts = listing.fulltext.as_deref().map(quote).unwrap_or_default();
        let mut params = Vec::new();

        let mut conditions = Vec::new();
        for filter in &self.filters {
            match filter {
                Filter::Matches { query } => {
                    conditions.push(format!("{t}.rowid IN (SELECT rowid FROM {fts} WHERE {fts} MATCH ?)"));
                    params.push(Value::Text(query.clone()));
                }
                Filter::Between { column, min, max } => {
                    conditions.push(format!("{0} >= ? AND {0} <= ?", col(column)));
                    params.push(Value::Integer(*min));
                    params.push(Value::Integer(*max));
                }
                Filter::Equals { column, value } => {
                    conditions.push(format!("{} = ?", col(column)));
                    params.push(Value::Text(value.clone()));
                }
            }
        }

        let mut terms = Vec::new();
        for order in &self.order {
            match order {
                Order::Column { column, descending } => {
                    terms.push(format!("{} {}", col(column), if *descending { "DESC" } else { "ASC" }));
                }
                Order::Relevance { query } => {
                    terms.push(format!(
                        "(SELECT bm25({fts}) FROM {fts} WHERE {fts} MATCH ? AND {fts}.rowid = {t}.rowid) ASC"
                    ));
                    params.push(Value::Text(query.clone()));
                }
                Order::Recency { column } => terms.push(format!("{} DESC", col(column))),
                Order::NaturalPrefix { column } => terms.push(format!("natural_prefix({}) ASC", col(column))),
                Order::NaturalNumber { column } => terms.push(format!("natural_number({}) ASC", col(column))),
            }
        }

        let mut clause = String::new();
        if !conditions.is_empty() {
            clause.push_str(&format!("WHERE {} ", conditions.join(" AND ")));
        }
        clause.push_str(&format!("ORDER BY {} LIMIT {} OFFSET {}", terms.join(", "), self.limit, self.offset));

        CompiledQuery { table: listing.table.clone(), id_column: listing.id_column.clone(), clause, params }
    }
}
