//! Declarative relation schemas.
//!
//! A relation is described as data: a list of typed columns plus optional
//! structural clauses. [`RelationSpec::create_statements`] is the only place
//! that turns a description into DDL.

use super::ident::{self, quote};
use crate::Error;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// Seconds since the Unix epoch, stored as an integer.
    Timestamp,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer | ColumnType::Timestamp => "INTEGER",
        }
    }
}

/// One column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl Column {
    fn new(name: &str, ty: ColumnType) -> Self {
        Self { name: name.to_string(), ty, nullable: false, primary_key: false }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn timestamp(name: &str) -> Self {
        Self::new(name, ColumnType::Timestamp)
    }

    /// Allow NULL values in this column.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    fn definition(&self) -> String {
        let mut def = format!("{} {}", quote(&self.name), self.ty.sql());
        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        def
    }
}

/// Extra structure attached to a relation at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Secondary index over the listed columns.
    Index(Vec<String>),
    /// Full-text index over one text column, kept in sync by triggers.
    FullText(String),
}

/// Complete description of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub name: String,
    pub columns: Vec<Column>,
    pub clauses: Vec<Clause>,
}

impl RelationSpec {
    pub fn new(name: &str, columns: Vec<Column>) -> Self {
        Self { name: name.to_string(), columns, clauses: Vec::new() }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Column carrying the full-text index, if any.
    pub fn fulltext_column(&self) -> Option<&str> {
        self.clauses.iter().find_map(|c| match c {
            Clause::FullText(column) => Some(column.as_str()),
            Clause::Index(_) => None,
        })
    }

    fn check(&self) -> Result<(), Error> {
        ident::validate("relation", &self.name)?;
        if self.columns.is_empty() {
            return Err(Error::Validation(format!("Relation '{}' declares no columns", self.name)));
        }
        for column in &self.columns {
            ident::validate_column(&column.name)?;
        }
        let declared = |name: &str| self.columns.iter().any(|c| c.name == name);
        for clause in &self.clauses {
            let referenced: Vec<&str> = match clause {
                Clause::Index(columns) => columns.iter().map(String::as_str).collect(),
                Clause::FullText(column) => vec![column.as_str()],
            };
            if referenced.is_empty() {
                return Err(Error::Validation(format!("Relation '{}' has an empty index clause", self.name)));
            }
            if let Some(missing) = referenced.iter().find(|c| !declared(c)) {
                return Err(Error::Validation(format!(
                    "Relation '{}' indexes undeclared column '{missing}'",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// DDL creating this relation under the physical name `table`.
    ///
    /// Every statement is idempotent (`IF NOT EXISTS`).
    pub fn create_statements(&self, table: &str) -> Result<Vec<String>, Error> {
        self.check()?;

        let columns: Vec<String> = self.columns.iter().map(Column::definition).collect();
        let mut statements = vec![format!("CREATE TABLE IF NOT EXISTS {} ({})", quote(table), columns.join(", "))];

        for clause in &self.clauses {
            match clause {
                Clause::Index(columns) => {
                    let name = format!("{table}__idx_{}", columns.join("_"));
                    let cols: Vec<String> = columns.iter().map(|c| quote(c)).collect();
                    statements.push(format!(
                        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                        quote(&name),
                        quote(table),
                        cols.join(", ")
                    ));
                }
                Clause::FullText(column) => statements.extend(fulltext_statements(table, column)),
            }
        }

        Ok(statements)
    }
}

/// External-content FTS5 index over `table.column` plus the triggers that
/// mirror inserts, deletes and updates into it.
fn fulltext_statements(table: &str, column: &str) -> Vec<String> {
    let fts = ident::fulltext_table(table);
    let (t, f, c) = (quote(table), quote(&fts), quote(column));
    vec![
        format!("CREATE VIRTUAL TABLE IF NOT EXISTS {f} USING fts5({c}, content='{table}', content_rowid='rowid')"),
        format!(
            "CREATE TRIGGER IF NOT EXISTS {} AFTER INSERT ON {t} BEGIN \
             INSERT INTO {f}(rowid, {c}) VALUES (new.rowid, new.{c}); END",
            quote(&format!("{fts}_ai"))
        ),
        format!(
            "CREATE TRIGGER IF NOT EXISTS {} AFTER DELETE ON {t} BEGIN \
             INSERT INTO {f}({f}, rowid, {c}) VALUES ('delete', old.rowid, old.{c}); END",
            quote(&format!("{fts}_ad"))
        ),
        format!(
            "CREATE TRIGGER IF NOT EXISTS {} AFTER UPDATE ON {t} BEGIN \
             INSERT INTO {f}({f}, rowid, {c}) VALUES ('delete', old.rowid, old.{c}); \
             INSERT INTO {f}(rowid, {c}) VALUES (new.rowid, new.{c}); END",
            quote(&format!("{fts}_au"))
        ),
    ]
}
