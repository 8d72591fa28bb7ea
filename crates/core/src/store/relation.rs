//! Generic CRUD over a single named relation.
//!
//! A [`Relation`] knows nothing about what its rows mean. Values always
//! travel as bound parameters; only identifiers and caller-built clause text
//! are interpolated into statements.

use super::connection::Session;
use super::ident::{self, quote};
use crate::{Error, Value};
use tokio_rusqlite::rusqlite::{self, params_from_iter};

/// A filter clause with its positional parameters.
///
/// `clause` uses anonymous `?` placeholders, consumed in order from `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub params: Vec<Value>,
}

impl Predicate {
    pub fn new(clause: impl Into<String>, params: Vec<Value>) -> Self {
        Self { clause: clause.into(), params }
    }

    /// `column = value`.
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self { clause: format!("{} = ?", quote(column)), params: vec![value.into()] }
    }

    /// Conjunction of two predicates, keeping parameter order.
    pub fn and(mut self, other: Predicate) -> Self {
        self.clause = format!("({}) AND ({})", self.clause, other.clause);
        self.params.extend(other.params);
        self
    }
}

/// Split `total` rows into a leading short batch and a number of full ones.
///
/// Returns `(remainder, full_batches)`.
pub fn batch_plan(total: usize, batch_size: usize) -> (usize, usize) {
    let remainder = total % batch_size;
    (remainder, (total - remainder) / batch_size)
}

fn insert_sql(table: &str, columns: &[String], rows: usize) -> String {
    let fields: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    let tuple = format!("({})", vec!["?"; columns.len()].join(","));
    format!("INSERT INTO {} ({}) VALUES {}", quote(table), fields.join(","), vec![tuple; rows].join(","))
}

fn where_sql(predicate: Option<&Predicate>) -> String {
    predicate.map(|p| format!(" WHERE {}", p.clause)).unwrap_or_default()
}

/// Handle to one physical relation, bound to a session.
#[derive(Debug, Clone)]
pub struct Relation<'s> {
    session: &'s Session,
    table: String,
}

impl<'s> Relation<'s> {
    pub(crate) fn new(session: &'s Session, table: String) -> Self {
        Self { session, table }
    }

    /// Handle to a namespace-independent relation such as `_annotations`.
    pub fn global(session: &'s Session, table: &str) -> Self {
        Self::new(session, table.to_string())
    }

    /// Physical table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Physical table name, quoted for use in clause text.
    pub fn quoted(&self) -> String {
        quote(&self.table)
    }

    /// Insert `rows` in batches of `batch_size`.
    ///
    /// When the row count is not a multiple of the batch size, the remainder
    /// goes first as one short batch; full batches then reuse a single
    /// prepared statement. Returns the number of rows inserted.
    pub async fn insert(&self, columns: &[&str], rows: Vec<Vec<Value>>, batch_size: usize) -> Result<usize, Error> {
        if rows.is_empty() {
            return Ok(0);
        }
        if batch_size == 0 {
            return Err(Error::Validation("batch size must be greater than 0".into()));
        }
        for column in columns {
            ident::validate_column(column)?;
        }
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(Error::Validation(format!(
                "row has {} values for {} columns of '{}'",
                row.len(),
                columns.len(),
                self.table
            )));
        }

        let total = rows.len();
        let (remainder, full) = batch_plan(total, batch_size);
        let table = self.table.clone();
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        tracing::debug!(table = %table, total, remainder, full, "inserting rows");

        self.session
            .conn
            .call(move |conn| -> Result<(), Error> {
                let mut rows = rows.into_iter();
                if remainder > 0 {
                    let values: Vec<Value> = rows.by_ref().take(remainder).flatten().collect();
                    conn.execute(&insert_sql(&table, &columns, remainder), params_from_iter(values))?;
                }
                if full > 0 {
                    let mut stmt = conn.prepare(&insert_sql(&table, &columns, batch_size))?;
                    for _ in 0..full {
                        let values: Vec<Value> = rows.by_ref().take(batch_size).flatten().collect();
                        stmt.execute(params_from_iter(values))?;
                    }
                }
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(total)
    }

    /// Remove every row, or only the rows matching `predicate`.
    ///
    /// Returns the number of deleted rows.
    pub async fn delete(&self, predicate: Option<Predicate>) -> Result<usize, Error> {
        let sql = format!("DELETE FROM {}{}", self.quoted(), where_sql(predicate.as_ref()));
        let params = predicate.map(|p| p.params).unwrap_or_default();
        self.session
            .conn
            .call(move |conn| -> Result<usize, Error> { Ok(conn.execute(&sql, params_from_iter(params))?) })
            .await
            .map_err(Error::from)
    }

    /// Select `columns` with a caller-built `fragment`.
    ///
    /// The fragment may hold joins, a filter, an ordering and a limit; its
    /// placeholders are bound from `params` in order. Each row is converted
    /// with `map`.
    pub async fn select<T, F>(&self, columns: &str, fragment: &str, params: Vec<Value>, map: F) -> Result<Vec<T>, Error>
    where
        T: Send + 'static,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let sql = format!("SELECT {columns} FROM {} {fragment}", self.quoted());
        tracing::debug!(sql = %sql, params = params.len(), "select");
        self.session
            .conn
            .call(move |conn| -> Result<Vec<T>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(params), map)?;
                Ok(rows.collect::<Result<Vec<T>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Set one column to `value` for all rows matching `predicate`.
    ///
    /// Meant for small control-plane values. Returns the number of rows
    /// changed.
    pub async fn update_scalar(&self, column: &str, value: Value, predicate: Option<Predicate>) -> Result<usize, Error> {
        ident::validate_column(column)?;
        let sql = format!("UPDATE {} SET {} = ?{}", self.quoted(), quote(column), where_sql(predicate.as_ref()));
        let mut params = vec![value];
        params.extend(predicate.map(|p| p.params).unwrap_or_default());
        self.session
            .conn
            .call(move |conn| -> Result<usize, Error> { Ok(conn.execute(&sql, params_from_iter(params))?) })
            .await
            .map_err(Error::from)
    }

    /// Number of rows in the relation.
    pub async fn count(&self) -> Result<i64, Error> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.quoted());
        self.session
            .conn
            .call(move |conn| -> Result<i64, Error> { Ok(conn.query_row(&sql, [], |row| row.get(0))?) })
            .await
            .map_err(Error::from)
    }
}
