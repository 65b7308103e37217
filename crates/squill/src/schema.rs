//! Schema and version containers.
//!
//! A [`Schema`] is an ordered collection of immutable [`Version`]s, built
//! once at startup and safe to share for read-only inspection afterwards.
//! Each version carries the snapshot of tables and indexes as they exist
//! *after* its operations, plus the operations themselves.

use std::collections::BTreeSet;

use sqlx::sqlite::SqlitePool;

use crate::builder::SchemaBuilder;
use crate::dialect;
use crate::error::Result;
use crate::executor::{self, MigrateOptions};
use crate::model::Snapshot;
use crate::operations::Operation;

/// One declared, immutable schema version.
#[derive(Debug)]
pub struct Version {
    number: i64,
    snapshot: Snapshot,
    operations: Vec<Operation>,
}

impl Version {
    pub(crate) fn new(number: i64, snapshot: Snapshot, operations: Vec<Operation>) -> Self {
        Self {
            number,
            snapshot,
            operations,
        }
    }

    /// The version number, 1-based and gapless.
    #[must_use]
    pub fn number(&self) -> i64 {
        self.number
    }

    /// The tables and indexes as they exist after this version.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The operations that produce this version from the previous one.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

/// An immutable, ordered collection of declared versions.
#[derive(Debug)]
pub struct Schema {
    identifier: String,
    versions: Vec<Version>,
}

impl Schema {
    /// Declares a schema.
    ///
    /// ```
    /// use squill::prelude::*;
    ///
    /// let schema = Schema::build("app", |s| {
    ///     s.version(1, |v| {
    ///         v.create_table(
    ///             Table::new("people")
    ///                 .column(Column::new("id", ColumnType::Integer))
    ///                 .column(Column::new("name", ColumnType::Text).not_null())
    ///                 .primary_key("id", true),
    ///         )
    ///     })
    /// })
    /// .unwrap();
    /// assert_eq!(schema.latest_version().unwrap().number(), 1);
    /// ```
    pub fn build(
        identifier: impl Into<String>,
        declare: impl FnOnce(&mut SchemaBuilder) -> Result<()>,
    ) -> Result<Self> {
        let mut builder = SchemaBuilder::new(identifier);
        declare(&mut builder)?;
        Ok(builder.finish())
    }

    pub(crate) fn from_parts(identifier: String, versions: Vec<Version>) -> Self {
        Self {
            identifier,
            versions,
        }
    }

    /// The identifier namespacing the persisted version counter.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Looks up a declared version by number.
    #[must_use]
    pub fn version(&self, number: i64) -> Option<&Version> {
        if number < 1 {
            return None;
        }
        self.versions.get(usize::try_from(number - 1).ok()?)
    }

    /// The highest declared version, if any.
    #[must_use]
    pub fn latest_version(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// All declared versions in order.
    #[must_use]
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// The versions strictly after `from` and up through `through`.
    pub(crate) fn versions_in_range(&self, from: i64, through: i64) -> &[Version] {
        let start = usize::try_from(from).unwrap_or(0);
        let end = usize::try_from(through).unwrap_or(0);
        &self.versions[start.min(self.versions.len())..end.min(self.versions.len())]
    }

    /// The SQL a declared version would execute, without touching any
    /// database. Opaque data-fixup steps contribute no SQL.
    #[must_use]
    pub fn statements_for(&self, number: i64) -> Option<Vec<String>> {
        self.version(number).map(|version| {
            version
                .operations()
                .iter()
                .flat_map(|op| dialect::statements(op))
                .collect()
        })
    }

    /// Every table name any declared version knows about, including names
    /// later dropped or renamed away.
    pub(crate) fn known_tables(&self) -> BTreeSet<String> {
        self.versions
            .iter()
            .flat_map(|v| v.snapshot().table_names())
            .map(String::from)
            .collect()
    }

    /// Every index name any declared version knows about.
    pub(crate) fn known_indexes(&self) -> BTreeSet<String> {
        self.versions
            .iter()
            .flat_map(|v| v.snapshot().index_names())
            .map(String::from)
            .collect()
    }

    /// Migrates the database to `to_version` (the latest declared version
    /// when unspecified) inside one transaction.
    ///
    /// Returns `Ok(false)` when the database is already at the target and
    /// nothing was done. On any failure the transaction rolls back, leaving
    /// the database exactly as it was, including the persisted version.
    pub async fn migrate(
        &self,
        pool: &SqlitePool,
        to_version: Option<i64>,
        options: MigrateOptions,
    ) -> Result<bool> {
        executor::migrate(self, pool, to_version, options).await
    }

    /// Drops every table and index known to any declared version and
    /// resets the persisted version number to 0.
    pub async fn reset(&self, pool: &SqlitePool) -> Result<()> {
        executor::reset(self, pool).await
    }
}
