//! Schema model value types.
//!
//! These types describe one full schema snapshot: the tables and indexes as
//! they exist at a given declared version. They are plain values with copy
//! semantics, so the snapshot stored on one version can never be mutated
//! through another.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Column type affinities supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Integer,
    /// 8-byte IEEE floating point.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// No declared type; the engine assigns no affinity to the column.
    Any,
}

impl ColumnType {
    /// Returns the SQL keyword for this type, empty for [`Self::Any`].
    #[must_use]
    pub fn sql_name(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Any => "",
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, case-sensitive-unique within its table.
    pub name: String,
    /// Declared type affinity.
    pub column_type: ColumnType,
    /// Raw constraint clauses in declaration order, e.g. `"NOT NULL"`.
    pub constraints: Vec<String>,
}

impl Column {
    /// Creates a column with no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            constraints: Vec::new(),
        }
    }

    /// Appends a raw constraint clause.
    #[must_use]
    pub fn constraint(mut self, clause: impl Into<String>) -> Self {
        self.constraints.push(clause.into());
        self
    }

    /// Appends a `NOT NULL` constraint.
    #[must_use]
    pub fn not_null(self) -> Self {
        self.constraint("NOT NULL")
    }

    /// Appends a `UNIQUE` constraint.
    #[must_use]
    pub fn unique(self) -> Self {
        self.constraint("UNIQUE")
    }

    /// Appends a `DEFAULT` constraint with the given SQL expression.
    #[must_use]
    pub fn default_to(self, expr: impl Into<String>) -> Self {
        let clause = format!("DEFAULT {}", expr.into());
        self.constraint(clause)
    }

    /// Returns the default expression parsed out of the constraint clauses.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.constraints.iter().find_map(|clause| {
            let trimmed = clause.trim();
            let head = trimmed.get(..7)?;
            if head.eq_ignore_ascii_case("default") {
                let rest = trimmed[7..].trim_start();
                (!rest.is_empty()).then_some(rest)
            } else {
                None
            }
        })
    }
}

/// A table-level constraint clause, optionally named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConstraint {
    /// Constraint name, if declared with one.
    pub name: Option<String>,
    /// Raw constraint definition, e.g. `"UNIQUE (first, last)"`.
    pub definition: String,
}

impl TableConstraint {
    /// Creates an unnamed table constraint.
    #[must_use]
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            name: None,
            definition: definition.into(),
        }
    }

    /// Creates a named table constraint.
    #[must_use]
    pub fn named(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            definition: definition.into(),
        }
    }
}

/// Primary key declaration: one column, optionally autoincrementing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Column carrying the primary key.
    pub column: String,
    /// Whether the key autoincrements (requires an INTEGER column).
    pub autoincrement: bool,
}

/// One table of a schema snapshot.
///
/// Column order matters: it is the physical order used when regenerating
/// `CREATE TABLE` and `INSERT ... SELECT` statements during a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unique within a snapshot.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Table-level constraints in declaration order.
    pub constraints: Vec<TableConstraint>,
    /// Primary key declaration, at most one.
    pub primary_key: Option<PrimaryKey>,
}

impl Table {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            primary_key: None,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends a table-level constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: TableConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Declares the primary key on an already-declared column.
    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>, autoincrement: bool) -> Self {
        self.primary_key = Some(PrimaryKey {
            column: column.into(),
            autoincrement,
        });
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column_named(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// One index of a schema snapshot.
///
/// Index names live in their own namespace, independent from tables. An
/// index is structurally invalid if any of its columns does not exist in
/// its table; the alter-table compiler either remaps or drops it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name, unique within a snapshot.
    pub name: String,
    /// Table the index covers.
    pub table: String,
    /// Covered columns in index order.
    pub columns: Vec<String>,
    /// Whether this is a UNIQUE index.
    pub unique: bool,
    /// Partial index predicate. Never rewritten on column rename; a stale
    /// predicate surfaces as an execution failure when the index is
    /// recreated.
    pub where_clause: Option<String>,
}

impl Index {
    /// Creates a non-unique index over the given columns.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            where_clause: None,
        }
    }

    /// Makes this a UNIQUE index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a partial index predicate.
    #[must_use]
    pub fn where_clause(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }
}

/// The full set of table and index definitions at one declared version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tables keyed by name, sorted for deterministic iteration.
    pub(crate) tables: BTreeMap<String, Table>,
    /// Indexes keyed by name, independent namespace from tables.
    pub(crate) indexes: BTreeMap<String, Index>,
}

impl Snapshot {
    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Returns all table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Returns all index names.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    /// Returns all tables.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Returns all indexes.
    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    /// Returns the indexes covering the given table.
    pub(crate) fn indexes_on(&self, table: &str) -> Vec<Index> {
        self.indexes
            .values()
            .filter(|i| i.table == table)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_builder_preserves_constraint_order() {
        let col = Column::new("name", ColumnType::Text)
            .not_null()
            .default_to("''");

        assert_eq!(col.constraints, vec!["NOT NULL", "DEFAULT ''"]);
    }

    #[test]
    fn default_value_parsed_from_constraints() {
        let col = Column::new("score", ColumnType::Integer).default_to("0");
        assert_eq!(col.default_value(), Some("0"));

        let col = Column::new("name", ColumnType::Text).constraint("default 'x'");
        assert_eq!(col.default_value(), Some("'x'"));

        let col = Column::new("name", ColumnType::Text).not_null();
        assert_eq!(col.default_value(), None);
    }

    #[test]
    fn table_builder() {
        let table = Table::new("people")
            .column(Column::new("id", ColumnType::Integer))
            .column(Column::new("name", ColumnType::Text).not_null())
            .primary_key("id", true);

        assert_eq!(table.columns.len(), 2);
        assert!(table.column_named("name").is_some());
        assert!(table.column_named("missing").is_none());
        assert_eq!(
            table.primary_key,
            Some(PrimaryKey {
                column: "id".to_string(),
                autoincrement: true
            })
        );
    }

    #[test]
    fn index_builder() {
        let index = Index::new("people_names", "people", ["last", "first"])
            .unique()
            .where_clause("last IS NOT NULL");

        assert_eq!(index.columns, vec!["last", "first"]);
        assert!(index.unique);
        assert_eq!(index.where_clause.as_deref(), Some("last IS NOT NULL"));
    }

    #[test]
    fn type_names() {
        assert_eq!(ColumnType::Integer.sql_name(), "INTEGER");
        assert_eq!(ColumnType::Text.sql_name(), "TEXT");
        assert_eq!(ColumnType::Any.sql_name(), "");
    }
}
