//! Schema of the relations shared by every namespace.
//!
//! Namespaces version themselves through their own attribute relation and
//! are rebuilt wholesale on a version change. Shared relations cannot be
//! dropped that way, so they evolve through numbered steps recorded in
//! `_migrations`. Each step commits together with its record.

use std::collections::BTreeSet;

use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior, params};

use crate::Error;

/// One numbered schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Steps in ascending version order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "annotations",
    sql: include_str!("../../migrations/001_annotations.sql"),
}];

const LEDGER: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

fn applied(conn: &rusqlite::Connection) -> rusqlite::Result<BTreeSet<i64>> {
    let mut stmt = conn.prepare("SELECT version FROM _migrations")?;
    let versions = stmt.query_map([], |row| row.get(0))?;
    versions.collect()
}

/// Apply every step of `steps` not yet recorded. Returns the versions applied.
fn apply(conn: &mut rusqlite::Connection, steps: &[Migration]) -> Result<Vec<i64>, Error> {
    conn.execute_batch(LEDGER)?;
    let done = applied(conn)?;

    if let Some(unknown) = done.iter().find(|v| !steps.iter().any(|s| s.version == **v)) {
        return Err(Error::MigrationFailed(format!(
            "database has version {unknown}, which this build does not know"
        )));
    }

    let mut fresh = Vec::new();
    for step in steps.iter().filter(|s| !done.contains(&s.version)) {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(step.sql)
            .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", step.version, step.name)))?;
        tx.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![step.version, step.name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        tracing::info!(version = step.version, name = step.name, "applied shared migration");
        fresh.push(step.version);
    }
    Ok(fresh)
}

/// Bring the shared relations up to date.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| apply(conn, MIGRATIONS).map(drop))
        .await
        .map_err(Error::from)
}
