//! Migration operations.
//!
//! Operations are the only thing the migration executor understands; the
//! declaration DSL and the alter-table compiler exist solely to produce
//! them. Each operation compiles to zero or more native statements in the
//! dialect module, except [`Operation::Execute`], which runs an opaque step
//! against the live connection.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::sqlite::SqliteConnection;

use crate::model::{Column, Index, Table};

/// Source expression for one column of a rebuild data copy.
///
/// The expression is raw SQL evaluated against the original table's rows in
/// the `INSERT ... SELECT` step. Columns with no source (brand-new columns
/// without a set-value expression) are omitted from the copy and filled by
/// their `DEFAULT` constraint or `NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSource {
    /// Destination column in the rebuilt table.
    pub column: String,
    /// SQL expression producing the value.
    pub expression: String,
}

/// Boxed async callback run against the live connection.
pub type ExecuteFn =
    Arc<dyn for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, sqlx::Result<()>> + Send + Sync>;

/// An opaque data-fixup step.
///
/// The schema model cannot reason about what a step does, so it has no
/// snapshot effect; the author is responsible for ordering it correctly
/// relative to structural operations.
#[derive(Clone)]
pub struct ExecuteStep(StepKind);

#[derive(Clone)]
enum StepKind {
    Sql(String),
    Callback(ExecuteFn),
}

impl ExecuteStep {
    /// A step that runs one raw SQL statement.
    #[must_use]
    pub fn sql(sql: impl Into<String>) -> Self {
        Self(StepKind::Sql(sql.into()))
    }

    /// A step that runs an arbitrary async callback on the connection.
    #[must_use]
    pub fn callback<F>(f: F) -> Self
    where
        F: for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, sqlx::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self(StepKind::Callback(Arc::new(f)))
    }

    /// Runs the step inside the migration transaction.
    pub(crate) async fn run(&self, conn: &mut SqliteConnection) -> sqlx::Result<()> {
        match &self.0 {
            StepKind::Sql(sql) => {
                sqlx::query(sql).execute(&mut *conn).await?;
                Ok(())
            }
            StepKind::Callback(f) => f(conn).await,
        }
    }
}

impl fmt::Debug for ExecuteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            StepKind::Sql(sql) => f.debug_tuple("ExecuteStep").field(sql).finish(),
            StepKind::Callback(_) => f.write_str("ExecuteStep(<callback>)"),
        }
    }
}

/// A single migration operation.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Create a new table.
    CreateTable {
        /// Full table definition.
        table: Table,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
        /// Whether to use IF EXISTS.
        if_exists: bool,
    },

    /// Rename a table. Indexes follow the table, no index SQL is needed.
    RenameTable {
        /// Old table name.
        old_name: String,
        /// New table name.
        new_name: String,
    },

    /// Add a column via the engine's native ALTER TABLE.
    ///
    /// This is the additive-only fast path of the alter-table compiler; it
    /// avoids a full-table copy.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: Column,
    },

    /// Rebuild a table: create under a temporary name, copy data, drop the
    /// original, rename into place, then recreate surviving indexes.
    ///
    /// Kept as one coarse operation so the executor recreates dependent
    /// indexes exactly once, after the rename, and a half-applied rebuild is
    /// never observable outside a transaction.
    AlterTableRebuild {
        /// Name of the table being rebuilt.
        original_name: String,
        /// Final table definition after all edits.
        table: Table,
        /// Per-column source expressions for the data copy.
        sources: Vec<ColumnSource>,
        /// Remapped indexes recreated strictly after the rename step.
        recreate_indexes: Vec<Index>,
    },

    /// Create an index.
    CreateIndex {
        /// Full index definition.
        index: Index,
        /// Whether to use IF NOT EXISTS.
        if_not_exists: bool,
    },

    /// Drop an index.
    DropIndex {
        /// Index name.
        name: String,
        /// Whether to use IF EXISTS.
        if_exists: bool,
    },

    /// Rename an index. The engine has no native rename, so this compiles
    /// to a drop and a recreate under the new name.
    RenameIndex {
        /// Old index name.
        old_name: String,
        /// Index definition under its new name.
        index: Index,
    },

    /// Run an opaque data-fixup step.
    Execute {
        /// The step to run.
        step: ExecuteStep,
    },
}

impl Operation {
    /// Returns a human-readable description, used in logs and attached to
    /// execution errors.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("create table '{}'", table.name),
            Self::DropTable { name, .. } => format!("drop table '{name}'"),
            Self::RenameTable { old_name, new_name } => {
                format!("rename table '{old_name}' to '{new_name}'")
            }
            Self::AddColumn { table, column } => {
                format!("add column '{}' to table '{table}'", column.name)
            }
            Self::AlterTableRebuild { original_name, .. } => {
                format!("rebuild table '{original_name}'")
            }
            Self::CreateIndex { index, .. } => {
                format!("create index '{}' on table '{}'", index.name, index.table)
            }
            Self::DropIndex { name, .. } => format!("drop index '{name}'"),
            Self::RenameIndex { old_name, index } => {
                format!("rename index '{old_name}' to '{}'", index.name)
            }
            Self::Execute { .. } => "execute data-fixup step".to_string(),
        }
    }
}
