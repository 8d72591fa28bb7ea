//! Identifier validation and quoting.
//!
//! Namespace, version and relation names end up inside generated schema
//! statements, so they are checked against a restricted character set before
//! any statement is built.

use crate::Error;

/// Check that `value` is a non-empty ASCII alphanumeric identifier.
///
/// `what` names the parameter in the error message.
pub fn validate(what: &str, value: &str) -> Result<(), Error> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid parameter <{what}>: '{value}'")))
    }
}

/// Check that `name` is usable as a column name.
///
/// Column names come from schema declarations rather than callers, but they
/// are interpolated the same way, so underscores are the only extra allowance.
pub fn validate_column(name: &str) -> Result<(), Error> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid column name: '{name}'")))
    }
}

/// Quote an identifier for SQLite.
///
/// Embedded double quotes are doubled, so the result is always a single
/// identifier token.
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Physical name of a data relation inside a namespace.
pub(crate) fn relation_table(namespace: &str, relation: &str) -> String {
    format!("{namespace}_{relation}")
}

/// Physical name of the registry relation of a namespace.
pub(crate) fn registry_table(namespace: &str) -> String {
    format!("{namespace}__registry")
}

/// Physical name of the full-text index attached to a relation.
pub(crate) fn fulltext_table(table: &str) -> String {
    format!("{table}__fts")
}
