//! Versioned schema migrations for SQLite.
//!
//! `squill` lets an application declare its database schema as an ordered
//! sequence of immutable versions and brings any database forward to the
//! latest declared version in one transaction. SQLite's `ALTER TABLE` only
//! supports renames and column additions, so anything richer is compiled
//! into the documented rebuild recipe: create a temporary table with the new
//! shape, copy the rows across, drop the original, rename the copy into
//! place, and recreate the surviving indexes. A whole block of edits
//! collapses into at most one rebuild.
//!
//! # Architecture
//!
//! - **Builder** - The declaration DSL: `Schema::build`, versions, tables,
//!   indexes, data-fixup steps
//! - **Compiler** - Turns an alter-table edit block into native statements
//!   or a single rebuild
//! - **Executor** - Applies the missing versions transactionally, tracking
//!   the persisted version per schema identifier
//! - **Dialect** - SQLite statement rendering
//!
//! # Example
//!
//! ```rust,no_run
//! use squill::prelude::*;
//!
//! # async fn demo(pool: sqlx::SqlitePool) -> squill::Result<()> {
//! let schema = Schema::build("app", |s| {
//!     s.version(1, |v| {
//!         v.create_table(
//!             Table::new("people")
//!                 .column(Column::new("id", ColumnType::Integer))
//!                 .column(Column::new("name", ColumnType::Text).not_null())
//!                 .primary_key("id", true),
//!         )
//!     })?;
//!     s.version(2, |v| {
//!         v.alter_table(
//!             "people",
//!             TableEdits::new()
//!                 .alter_column("name", ColumnChange::new().rename_to("full_name")),
//!         )
//!     })
//! })?;
//!
//! schema.migrate(&pool, None, MigrateOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod compiler;
mod dialect;
pub mod edits;
pub mod error;
pub mod executor;
pub mod model;
pub mod operations;
mod remap;
pub mod schema;
mod store;

pub use error::{MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{SchemaBuilder, VersionBuilder};
    pub use crate::edits::{ColumnChange, TableEdits};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::MigrateOptions;
    pub use crate::model::{Column, ColumnType, Index, PrimaryKey, Table, TableConstraint};
    pub use crate::operations::{ExecuteStep, Operation};
    pub use crate::schema::{Schema, Version};
}
