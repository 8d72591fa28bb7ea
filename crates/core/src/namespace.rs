//! Namespace registry.
//!
//! Each namespace ("site") owns:
//!
//! - an attribute relation named after the namespace, holding `key`/`value`
//!   pairs such as the schema version (`ver`), the last successful refresh
//!   (`updated`) and the refresh state (`pending`)
//! - a registry relation listing every data relation created so far
//! - the data relations themselves
//! - a side-metadata relation with its own lifecycle (see [`crate::aggregate`])
//!
//! Schema changes never alter a relation in place: a version mismatch drops
//! every registered relation plus the control relations and starts over.

use std::collections::BTreeSet;

use crate::aggregate;
use crate::refresh::RefreshState;
use crate::store::ident::{self, quote};
use crate::store::{Predicate, Relation, RelationSpec, Session};
use crate::{Error, Value};
use tokio_rusqlite::rusqlite::{self, OptionalExtension, TransactionBehavior, params};

pub const ATTR_VERSION: &str = "ver";
pub const ATTR_UPDATED: &str = "updated";
pub const ATTR_PENDING: &str = "pending";
pub const ATTR_LEASE: &str = "lease";

pub(crate) fn table_exists(conn: &rusqlite::Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
        params![table],
        |row| row.get(0),
    )
}

pub(crate) fn read_attribute(conn: &rusqlite::Connection, table: &str, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(&format!("SELECT value FROM {} WHERE key = ?1", quote(table)), params![key], |row| row.get(0))
        .optional()
}

pub(crate) fn write_attribute(conn: &rusqlite::Connection, table: &str, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            quote(table)
        ),
        params![key, value],
    )?;
    Ok(())
}

fn registered(conn: &rusqlite::Connection, namespace: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("SELECT name FROM {}", quote(&ident::registry_table(namespace))))?;
    let names = stmt.query_map([], |row| row.get(0))?;
    names.collect()
}

fn init(conn: &rusqlite::Connection, namespace: &str, version: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL);
         CREATE TABLE IF NOT EXISTS {} (name TEXT PRIMARY KEY NOT NULL);",
        quote(namespace),
        quote(&ident::registry_table(namespace))
    ))?;
    write_attribute(conn, namespace, ATTR_VERSION, version)?;
    write_attribute(conn, namespace, ATTR_PENDING, RefreshState::NeedsRefresh.as_str())?;
    Ok(())
}

fn clear(conn: &rusqlite::Connection, namespace: &str) -> rusqlite::Result<()> {
    for name in registered(conn, namespace)? {
        let table = ident::relation_table(namespace, &name);
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {};",
            quote(&ident::fulltext_table(&table)),
            quote(&table)
        ))?;
    }
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {};",
        quote(&ident::registry_table(namespace)),
        quote(namespace)
    ))
}

/// A validated namespace bound to a session.
#[derive(Debug, Clone)]
pub struct Namespace<'s> {
    session: &'s Session,
    name: String,
}

impl<'s> Namespace<'s> {
    /// Make sure the namespace exists at `version`.
    ///
    /// Creates the control relations on first use. When the stored version
    /// differs, every registered relation and both control relations are
    /// dropped and recreated, and the refresh state goes back to
    /// `needs-refresh`. Calling it again with the same version changes
    /// nothing. The whole check runs in one immediate transaction.
    pub async fn ensure(session: &'s Session, name: &str, version: &str) -> Result<Self, Error> {
        ident::validate("site", name)?;
        ident::validate("ver", version)?;

        let namespace = name.to_string();
        let version = version.to_string();
        let counters = aggregate::counters_spec().create_statements(&ident::relation_table(name, aggregate::COUNTERS))?;

        session
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                if !table_exists(&tx, &namespace)? {
                    tracing::info!(namespace = %namespace, version = %version, "initializing namespace");
                    init(&tx, &namespace, &version)?;
                } else {
                    let stored = read_attribute(&tx, &namespace, ATTR_VERSION)?;
                    if stored.as_deref() != Some(version.as_str()) {
                        tracing::info!(
                            namespace = %namespace,
                            from = stored.as_deref().unwrap_or("<none>"),
                            to = %version,
                            "schema version changed, rebuilding namespace"
                        );
                        clear(&tx, &namespace)?;
                        init(&tx, &namespace, &version)?;
                    }
                }
                for statement in &counters {
                    tx.execute_batch(statement)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Self { session, name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Create the relation described by `spec` unless it is already
    /// registered.
    ///
    /// Creation and registration commit together. Returns whether the
    /// relation was created by this call.
    pub async fn ensure_relation(&self, spec: &RelationSpec) -> Result<bool, Error> {
        if spec.name == aggregate::COUNTERS {
            return Err(Error::Validation(format!("Relation name '{}' is reserved", aggregate::COUNTERS)));
        }
        let statements = spec.create_statements(&ident::relation_table(&self.name, &spec.name))?;
        let registry = ident::registry_table(&self.name);
        let relation = spec.name.clone();

        let created = self
            .session
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let exists: bool = tx.query_row(
                    &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE name = ?1)", quote(&registry)),
                    params![relation],
                    |row| row.get(0),
                )?;
                if exists {
                    return Ok(false);
                }
                for statement in &statements {
                    tx.execute_batch(statement)?;
                }
                tx.execute(&format!("INSERT INTO {} (name) VALUES (?1)", quote(&registry)), params![relation])?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)?;

        if created {
            tracing::debug!(namespace = %self.name, relation = %spec.name, "relation created");
        }
        Ok(created)
    }

    /// Names of the registered relations.
    pub async fn relations(&self) -> Result<BTreeSet<String>, Error> {
        let names = self
            .registry()
            .select("name", "", vec![], |row| row.get::<_, String>(0))
            .await?;
        Ok(names.into_iter().collect())
    }

    /// Handle to the data relation `name` of this namespace.
    pub fn relation(&self, name: &str) -> Result<Relation<'s>, Error> {
        ident::validate("relation", name)?;
        Ok(Relation::new(self.session, ident::relation_table(&self.name, name)))
    }

    fn registry(&self) -> Relation<'s> {
        Relation::new(self.session, ident::registry_table(&self.name))
    }

    fn attributes(&self) -> Relation<'s> {
        Relation::new(self.session, self.name.clone())
    }

    /// Read an attribute; `None` when the key is unset.
    pub async fn attribute(&self, key: &str) -> Result<Option<String>, Error> {
        let values = self
            .attributes()
            .select("value", "WHERE key = ?", vec![Value::Text(key.to_string())], |row| row.get::<_, String>(0))
            .await?;
        Ok(values.into_iter().next())
    }

    /// Set an attribute, keeping exactly one row per key.
    pub async fn set_attribute(&self, key: &str, value: &str) -> Result<(), Error> {
        let attributes = self.attributes();
        let changed = attributes
            .update_scalar("value", Value::Text(value.to_string()), Some(Predicate::eq("key", key.to_string())))
            .await?;
        if changed == 0 {
            attributes
                .insert(&["key", "value"], vec![vec![Value::Text(key.to_string()), Value::Text(value.to_string())]], 1)
                .await?;
        }
        Ok(())
    }

    /// Remove an attribute. Returns whether it was set.
    pub async fn remove_attribute(&self, key: &str) -> Result<bool, Error> {
        let deleted = self
            .attributes()
            .delete(Some(Predicate::eq("key", key.to_string())))
            .await?;
        Ok(deleted > 0)
    }
}
