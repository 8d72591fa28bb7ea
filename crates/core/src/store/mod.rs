//! SQLite-backed relation store.
//!
//! This module provides the storage primitives everything else builds on:
//!
//! - Scoped sessions over a shared database file
//! - Declarative relation schemas with secondary and full-text indexes
//! - Generic batched insert, delete, select and scalar update
//! - Natural-order SQL functions for id tie-breaks
//! - Migrations for the namespace-independent relations

pub mod connection;
pub mod functions;
pub mod ident;
pub mod migrations;
pub mod relation;
pub mod schema;

pub use connection::{Session, Store};
pub use relation::{Predicate, Relation};
pub use schema::{Clause, Column, ColumnType, RelationSpec};
