//! Database connection management with pragma configuration.
//!
//! A [`Store`] knows where the database lives; a [`Session`] is one open
//! connection scoped to one request. Every connection gets the same pragmas
//! (WAL mode for concurrent readers) and the natural-order SQL functions.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{functions, migrations};
use crate::Error;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;
     PRAGMA busy_timeout=5000;";

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
enum Backend {
    File(PathBuf),
    /// In-memory databases vanish with their connection, so every session
    /// shares this one.
    Memory(Connection),
}

/// Handle to the backing database.
///
/// Cheap to clone; holds no connection of its own for file databases.
#[derive(Clone, Debug)]
pub struct Store {
    backend: Backend,
}

/// One connection, held for the duration of one request.
///
/// The connection is released when the session is dropped, whichever way
/// the request ends.
#[derive(Debug)]
pub struct Session {
    pub(crate) conn: Connection,
    id: u64,
}

async fn connect(conn: Connection) -> Result<Connection, Error> {
    conn.call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        functions::register(conn)?;
        Ok(())
    })
    .await
    .map_err(Error::Database)?;
    Ok(conn)
}

impl Store {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending global migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = connect(Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?).await?;

        migrations::run(&conn).await?;
        tracing::debug!(path = %path.display(), "store opened");

        Ok(Self { backend: Backend::File(path) })
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = connect(Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?).await?;

        migrations::run(&conn).await?;

        Ok(Self { backend: Backend::Memory(conn) })
    }

    /// Acquire a connection for one request.
    pub async fn session(&self) -> Result<Session, Error> {
        let conn = match &self.backend {
            Backend::File(path) => {
                connect(Connection::open(path).await.map_err(|e| Error::Database(e.into()))?).await?
            }
            Backend::Memory(conn) => conn.clone(),
        };
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session = id, "session acquired");
        Ok(Session { conn, id })
    }
}

impl Session {
    /// Identifier used to correlate log lines of one request.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(session = self.id, "session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        let version = session
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_sessions_share_data() {
        let store = Store::open_in_memory().await.unwrap();
        {
            let session = store.session().await.unwrap();
            session
                .conn
                .call(|conn| conn.execute_batch("CREATE TABLE sample (x INTEGER); INSERT INTO sample VALUES (7);"))
                .await
                .unwrap();
        }
        let session = store.session().await.unwrap();
        let x: i64 = session
            .conn
            .call(|conn| conn.query_row("SELECT x FROM sample", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(x, 7);
    }

    #[tokio::test]
    async fn test_file_sessions_are_distinct_connections() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("sitecache.sqlite")).await.unwrap();

        let first = store.session().await.unwrap();
        let second = store.session().await.unwrap();
        assert_ne!(first.id(), second.id());

        first
            .conn
            .call(|conn| conn.execute_batch("CREATE TABLE IF NOT EXISTS sample (x INTEGER); INSERT INTO sample VALUES (1);"))
            .await
            .unwrap();
        let count: i64 = second
            .conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM sample", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_functions_available_in_session() {
        let store = Store::open_in_memory().await.unwrap();
        let session = store.session().await.unwrap();
        let n: i64 = session
            .conn
            .call(|conn| conn.query_row("SELECT natural_number('abc010')", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(n, 10);
    }
}
