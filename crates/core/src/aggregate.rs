//! Side-metadata counters and their merge into listings.
//!
//! Every namespace has a `counters` relation keyed by entity id with two
//! integer counters. It is created alongside the namespace but is not
//! registered, so it survives version rebuilds and is replaced on its own
//! schedule.
//!
//! Fetches are always scoped by a subquery producing the ids of interest,
//! usually [`CompiledQuery::id_subquery`], so the side relation is never
//! scanned in full and the primary filter is never re-evaluated here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::namespace::Namespace;
use crate::query::CompiledQuery;
use crate::store::{Column, RelationSpec};
use crate::{Error, Value};

/// Name of the side-metadata relation inside every namespace.
pub const COUNTERS: &str = "counters";

/// Schema of the side-metadata relation.
pub fn counters_spec() -> RelationSpec {
    RelationSpec::new(
        COUNTERS,
        vec![Column::text("id").primary_key(), Column::integer("t"), Column::integer("s")],
    )
}

/// Per-entity counter pair, serialized as `[t, s]`.
///
/// Entities without a stored row get `Counters(0, 0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters(pub i64, pub i64);

/// Replace every counter row of `namespace` with `counters`.
///
/// Deletes all rows first, then inserts in batches. Returns the number of
/// rows written.
pub async fn replace_counters(
    namespace: &Namespace<'_>, counters: &HashMap<String, Counters>, batch_size: usize,
) -> Result<usize, Error> {
    let side = namespace.relation(COUNTERS)?;
    let mut rows: Vec<(&String, &Counters)> = counters.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    let rows = rows
        .into_iter()
        .map(|(id, Counters(t, s))| vec![Value::Text(id.clone()), Value::Integer(*t), Value::Integer(*s)])
        .collect();

    side.delete(None).await?;
    let written = side.insert(&["id", "t", "s"], rows, batch_size).await?;
    tracing::debug!(namespace = %namespace.name(), written, "counters replaced");
    Ok(written)
}

/// Counters for the ids produced by `subquery`, bound with `params`.
pub async fn counters_in(
    namespace: &Namespace<'_>, subquery: &str, params: Vec<Value>,
) -> Result<HashMap<String, Counters>, Error> {
    let side = namespace.relation(COUNTERS)?;
    let rows = side
        .select("id, t, s", &format!("WHERE id IN ({subquery})"), params, |row| {
            Ok((row.get::<_, String>(0)?, Counters(row.get(1)?, row.get(2)?)))
        })
        .await?;
    Ok(rows.into_iter().collect())
}

/// Counters for exactly the ids a compiled listing selects.
pub async fn counters_for(namespace: &Namespace<'_>, compiled: &CompiledQuery) -> Result<HashMap<String, Counters>, Error> {
    counters_in(namespace, &compiled.id_subquery(), compiled.params.clone()).await
}

/// Counters for `id`, defaulting to zero.
pub fn lookup(counters: &HashMap<String, Counters>, id: &str) -> Counters {
    counters.get(id).copied().unwrap_or_default()
}

/// Pair every entity with its counters, keeping order and length.
pub fn attach<T>(
    entities: Vec<T>, counters: &HashMap<String, Counters>, id: impl Fn(&T) -> &str,
) -> Vec<(T, Counters)> {
    entities
        .into_iter()
        .map(|entity| {
            let c = lookup(counters, id(&entity));
            (entity, c)
        })
        .collect()
}
