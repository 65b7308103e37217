//! Error types for the migration engine.

/// Errors raised while declaring a schema or running a migration.
///
/// Declaration errors (duplicate names, unknown columns, bad version
/// numbering) abort [`Schema::build`](crate::schema::Schema::build), so a
/// partially declared schema can never exist. Precondition errors are
/// returned by `migrate` before any database work. Execution failures carry
/// the identity of the failing version and operation.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A table with this name already exists in the working snapshot.
    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    /// The named table does not exist in the working snapshot.
    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    /// A column with this name already exists in the table.
    #[error("column '{column}' already exists in table '{table}'")]
    DuplicateColumn {
        /// Table being declared or altered.
        table: String,
        /// Offending column name.
        column: String,
    },

    /// A column edit or index referenced a column the table does not have.
    #[error("column '{column}' does not exist in table '{table}'")]
    UnknownColumn {
        /// Table being declared or altered.
        table: String,
        /// Missing column name.
        column: String,
    },

    /// An index with this name already exists in the working snapshot.
    #[error("index '{0}' already exists")]
    DuplicateIndex(String),

    /// The named index does not exist in the working snapshot.
    #[error("index '{0}' does not exist")]
    UnknownIndex(String),

    /// A named table constraint with this name already exists.
    #[error("constraint '{name}' already exists in table '{table}'")]
    DuplicateConstraint {
        /// Table being altered.
        table: String,
        /// Offending constraint name.
        name: String,
    },

    /// A constraint drop referenced a name the table does not have.
    #[error("constraint '{name}' does not exist in table '{table}'")]
    UnknownConstraint {
        /// Table being altered.
        table: String,
        /// Missing constraint name.
        name: String,
    },

    /// An AUTOINCREMENT primary key was declared on a non-INTEGER column.
    #[error("primary key column '{column}' in table '{table}' must be INTEGER to autoincrement")]
    InvalidPrimaryKey {
        /// Table being declared or altered.
        table: String,
        /// Primary key column name.
        column: String,
    },

    /// Versions must be declared 1, 2, 3, ... without gaps or duplicates.
    #[error("expected version {expected}, found version {found}: versions must be numbered consecutively from 1")]
    InvalidVersion {
        /// The next valid version number.
        expected: i64,
        /// The number that was declared.
        found: i64,
    },

    /// The requested target version is negative or above the latest declared.
    #[error("target version {requested} is out of range: latest declared version is {latest}")]
    TargetOutOfRange {
        /// Requested target version.
        requested: i64,
        /// Highest declared version.
        latest: i64,
    },

    /// Database error outside of applying a specific operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An operation failed while being applied; the whole run is rolled back.
    #[error("migration to version {version} failed at {operation}: {source}")]
    OperationFailed {
        /// Version whose operation failed.
        version: i64,
        /// Description of the failing operation.
        operation: String,
        /// Underlying engine error.
        source: sqlx::Error,
    },
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
