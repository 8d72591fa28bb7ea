//! Scalar SQL functions registered on every connection.
//!
//! Entity ids such as `abc123` are stored as text but sorted naturally: first
//! by their non-numeric part, then by their digits read as an integer.
//! SQLite has no regex replacement, so both halves are exposed as functions:
//!
//! - `natural_prefix(id)`: `id` with every ASCII digit removed
//! - `natural_number(id)`: every ASCII digit of `id` parsed as an integer,
//!   `0` when there are none

use tokio_rusqlite::rusqlite::{self, Connection, functions::FunctionFlags};

/// Non-numeric part of an id.
pub fn natural_prefix(id: &str) -> String {
    id.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Numeric part of an id; saturates at `i64::MAX`.
pub fn natural_number(id: &str) -> i64 {
    id.bytes()
        .filter(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')))
}

/// Register the natural-order functions on `conn`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("natural_prefix", 1, flags, |ctx| {
        let id: Option<String> = ctx.get(0)?;
        Ok(id.map(|id| natural_prefix(&id)))
    })?;

    conn.create_scalar_function("natural_number", 1, flags, |ctx| {
        let id: Option<String> = ctx.get(0)?;
        Ok(id.map(|id| natural_number(&id)))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(natural_prefix("abc123"), "abc");
        assert_eq!(natural_number("abc123"), 123);
        assert_eq!(natural_prefix("abc001_a"), "abc_a");
        assert_eq!(natural_number("abc001_a"), 1);
    }

    #[test]
    fn test_no_digits() {
        assert_eq!(natural_number("practice"), 0);
        assert_eq!(natural_prefix("practice"), "practice");
    }

    #[test]
    fn test_saturates() {
        assert_eq!(natural_number("x99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_registered_functions() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        let (prefix, number): (String, i64) = conn
            .query_row("SELECT natural_prefix('arc42'), natural_number('arc42')", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(prefix, "arc");
        assert_eq!(number, 42);

        let null: Option<String> = conn
            .query_row("SELECT natural_prefix(NULL)", [], |row| row.get(0))
            .unwrap();
        assert!(null.is_none());
    }
}
