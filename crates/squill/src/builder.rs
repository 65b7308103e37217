//! The schema declaration DSL.
//!
//! A schema is declared as an ordered sequence of numbered versions. Each
//! version's declaration runs against a working copy of the previous
//! version's snapshot; every builder call both mutates the working snapshot
//! and appends the operations that justify the delta. Declaration errors
//! abort [`Schema::build`](crate::schema::Schema::build) immediately, so a
//! partially declared schema never exists.

use std::collections::BTreeSet;

use futures::future::BoxFuture;
use sqlx::sqlite::SqliteConnection;

use crate::compiler;
use crate::edits::TableEdits;
use crate::error::{MigrateError, Result};
use crate::model::{ColumnType, Index, Snapshot, Table};
use crate::operations::{ExecuteStep, Operation};
use crate::schema::{Schema, Version};

/// Accumulates declared versions into a [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    identifier: String,
    versions: Vec<Version>,
}

impl SchemaBuilder {
    /// Creates a builder for a schema with the given identifier.
    ///
    /// The identifier namespaces the persisted version counter, so several
    /// schemas can share one database file.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            versions: Vec::new(),
        }
    }

    /// Declares the next version.
    ///
    /// Versions must be numbered consecutively from 1. The declaration
    /// closure receives a [`VersionBuilder`] seeded with the previous
    /// version's snapshot.
    pub fn version(
        &mut self,
        number: i64,
        declare: impl FnOnce(&mut VersionBuilder) -> Result<()>,
    ) -> Result<()> {
        let expected = self.versions.len() as i64 + 1;
        if number != expected {
            return Err(MigrateError::InvalidVersion {
                expected,
                found: number,
            });
        }

        let snapshot = self
            .versions
            .last()
            .map(|v| v.snapshot().clone())
            .unwrap_or_default();
        let mut builder = VersionBuilder {
            snapshot,
            operations: Vec::new(),
        };
        declare(&mut builder)?;

        self.versions
            .push(Version::new(number, builder.snapshot, builder.operations));
        Ok(())
    }

    /// Finishes the declaration.
    #[must_use]
    pub fn finish(self) -> Schema {
        Schema::from_parts(self.identifier, self.versions)
    }
}

/// Declares the structural changes of one version.
#[derive(Debug)]
pub struct VersionBuilder {
    snapshot: Snapshot,
    operations: Vec<Operation>,
}

impl VersionBuilder {
    /// Creates a table.
    ///
    /// Errors if a table with that name already exists in the working
    /// snapshot, if column names collide, or if the primary key declaration
    /// references a missing column.
    pub fn create_table(&mut self, table: Table) -> Result<()> {
        if self.snapshot.tables.contains_key(&table.name) {
            return Err(MigrateError::DuplicateTable(table.name));
        }

        let mut seen = BTreeSet::new();
        for column in &table.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(MigrateError::DuplicateColumn {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        if let Some(pk) = &table.primary_key {
            let column = table.column_named(&pk.column).ok_or_else(|| {
                MigrateError::UnknownColumn {
                    table: table.name.clone(),
                    column: pk.column.clone(),
                }
            })?;
            if pk.autoincrement && column.column_type != ColumnType::Integer {
                return Err(MigrateError::InvalidPrimaryKey {
                    table: table.name.clone(),
                    column: pk.column.clone(),
                });
            }
        }

        self.operations.push(Operation::CreateTable {
            table: table.clone(),
        });
        self.snapshot.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Drops a table and every index covering it. Errors if the table does
    /// not exist.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.drop_table_inner(name, false)
    }

    /// Drops a table if it exists; never errors on a missing table.
    pub fn drop_table_if_exists(&mut self, name: &str) -> Result<()> {
        self.drop_table_inner(name, true)
    }

    fn drop_table_inner(&mut self, name: &str, if_exists: bool) -> Result<()> {
        if self.snapshot.tables.remove(name).is_none() {
            if !if_exists {
                return Err(MigrateError::UnknownTable(name.to_string()));
            }
            self.operations.push(Operation::DropTable {
                name: name.to_string(),
                if_exists: true,
            });
            return Ok(());
        }

        // Dependent index removal is recorded, not silent.
        let dependent: Vec<String> = self
            .snapshot
            .indexes
            .values()
            .filter(|i| i.table == name)
            .map(|i| i.name.clone())
            .collect();
        for index_name in dependent {
            self.snapshot.indexes.remove(&index_name);
            self.operations.push(Operation::DropIndex {
                name: index_name,
                if_exists: true,
            });
        }

        self.operations.push(Operation::DropTable {
            name: name.to_string(),
            if_exists,
        });
        Ok(())
    }

    /// Renames a table, rewriting every index's table reference. The
    /// engine's indexes follow the table, so only one statement is emitted.
    pub fn rename_table(&mut self, from: &str, to: &str) -> Result<()> {
        if self.snapshot.tables.contains_key(to) {
            return Err(MigrateError::DuplicateTable(to.to_string()));
        }
        let mut table = self
            .snapshot
            .tables
            .remove(from)
            .ok_or_else(|| MigrateError::UnknownTable(from.to_string()))?;
        table.name = to.to_string();
        self.snapshot.tables.insert(to.to_string(), table);

        for index in self.snapshot.indexes.values_mut() {
            if index.table == from {
                index.table = to.to_string();
            }
        }

        self.operations.push(Operation::RenameTable {
            old_name: from.to_string(),
            new_name: to.to_string(),
        });
        Ok(())
    }

    /// Applies an edit block to a table through the alter-table compiler.
    ///
    /// The whole block compiles to either native ADD COLUMN statements or a
    /// single table rebuild; see [`crate::edits::TableEdits`].
    pub fn alter_table(&mut self, name: &str, edits: TableEdits) -> Result<()> {
        let table = self
            .snapshot
            .tables
            .get(name)
            .ok_or_else(|| MigrateError::UnknownTable(name.to_string()))?;
        let indexes = self.snapshot.indexes_on(name);

        let plan = compiler::compile_alter(table, &edits, &indexes)?;

        for dropped in &plan.dropped_indexes {
            self.snapshot.indexes.remove(dropped);
        }
        for index in &plan.recreated_indexes {
            self.snapshot.indexes.insert(index.name.clone(), index.clone());
        }
        self.snapshot.tables.insert(name.to_string(), plan.table);
        self.operations.extend(plan.operations);
        Ok(())
    }

    /// Creates an index. Errors if the name is taken, the table is missing,
    /// or any covered column does not exist.
    pub fn create_index(&mut self, index: Index) -> Result<()> {
        self.create_index_inner(index, false)
    }

    /// Creates an index unless one with that name already exists.
    pub fn create_index_if_not_exists(&mut self, index: Index) -> Result<()> {
        self.create_index_inner(index, true)
    }

    fn create_index_inner(&mut self, index: Index, if_not_exists: bool) -> Result<()> {
        if self.snapshot.indexes.contains_key(&index.name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(MigrateError::DuplicateIndex(index.name));
        }

        let table = self
            .snapshot
            .tables
            .get(&index.table)
            .ok_or_else(|| MigrateError::UnknownTable(index.table.clone()))?;
        for column in &index.columns {
            if table.column_named(column).is_none() {
                return Err(MigrateError::UnknownColumn {
                    table: index.table.clone(),
                    column: column.clone(),
                });
            }
        }

        self.operations.push(Operation::CreateIndex {
            index: index.clone(),
            if_not_exists,
        });
        self.snapshot.indexes.insert(index.name.clone(), index);
        Ok(())
    }

    /// Drops an index. Errors if it does not exist.
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        self.drop_index_inner(name, false)
    }

    /// Drops an index if it exists; never errors on a missing index.
    pub fn drop_index_if_exists(&mut self, name: &str) -> Result<()> {
        self.drop_index_inner(name, true)
    }

    fn drop_index_inner(&mut self, name: &str, if_exists: bool) -> Result<()> {
        if self.snapshot.indexes.remove(name).is_none() && !if_exists {
            return Err(MigrateError::UnknownIndex(name.to_string()));
        }
        self.operations.push(Operation::DropIndex {
            name: name.to_string(),
            if_exists,
        });
        Ok(())
    }

    /// Renames an index. The engine has no native rename, so this compiles
    /// to a drop and a recreate under the new name.
    pub fn rename_index(&mut self, from: &str, to: &str) -> Result<()> {
        if self.snapshot.indexes.contains_key(to) {
            return Err(MigrateError::DuplicateIndex(to.to_string()));
        }
        let mut index = self
            .snapshot
            .indexes
            .remove(from)
            .ok_or_else(|| MigrateError::UnknownIndex(from.to_string()))?;
        index.name = to.to_string();
        self.snapshot.indexes.insert(to.to_string(), index.clone());

        self.operations.push(Operation::RenameIndex {
            old_name: from.to_string(),
            index,
        });
        Ok(())
    }

    /// Appends an opaque data-fixup callback. It has no snapshot effect;
    /// the author must order it correctly relative to structural steps.
    pub fn execute<F>(&mut self, callback: F)
    where
        F: for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, sqlx::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.operations.push(Operation::Execute {
            step: ExecuteStep::callback(callback),
        });
    }

    /// Appends a raw SQL data-fixup step.
    pub fn execute_sql(&mut self, sql: impl Into<String>) {
        self.operations.push(Operation::Execute {
            step: ExecuteStep::sql(sql),
        });
    }

    /// Returns the working snapshot as declared so far in this version.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::ColumnChange;
    use crate::model::Column;

    fn people() -> Table {
        Table::new("people")
            .column(Column::new("id", ColumnType::Integer))
            .column(Column::new("name", ColumnType::Text).not_null())
            .primary_key("id", true)
    }

    #[test]
    fn versions_must_be_consecutive() {
        let mut builder = SchemaBuilder::new("app");
        builder.version(1, |_| Ok(())).unwrap();

        let err = builder.version(3, |_| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::InvalidVersion {
                expected: 2,
                found: 3
            }
        ));

        let err = builder.version(2, |_| Err(MigrateError::UnknownTable("x".into())));
        assert!(err.is_err());
    }

    #[test]
    fn duplicate_table_is_a_declaration_error() {
        let mut builder = SchemaBuilder::new("app");
        let err = builder
            .version(1, |v| {
                v.create_table(people())?;
                v.create_table(people())
            })
            .unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateTable(ref name) if name == "people"));
    }

    #[test]
    fn duplicate_column_is_a_declaration_error() {
        let table = Table::new("t")
            .column(Column::new("a", ColumnType::Integer))
            .column(Column::new("a", ColumnType::Text));

        let mut builder = SchemaBuilder::new("app");
        let err = builder.version(1, |v| v.create_table(table)).unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateColumn { .. }));
    }

    #[test]
    fn primary_key_must_reference_a_declared_column() {
        let table = Table::new("t")
            .column(Column::new("a", ColumnType::Integer))
            .primary_key("missing", false);

        let mut builder = SchemaBuilder::new("app");
        let err = builder.version(1, |v| v.create_table(table)).unwrap_err();
        assert!(matches!(err, MigrateError::UnknownColumn { .. }));
    }

    #[test]
    fn autoincrement_requires_an_integer_column() {
        let table = Table::new("t")
            .column(Column::new("a", ColumnType::Text))
            .primary_key("a", true);

        let mut builder = SchemaBuilder::new("app");
        let err = builder.version(1, |v| v.create_table(table)).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidPrimaryKey { .. }));
    }

    #[test]
    fn drop_table_removes_dependent_indexes_and_records_them() {
        let mut builder = SchemaBuilder::new("app");
        builder
            .version(1, |v| {
                v.create_table(people())?;
                v.create_index(Index::new("by_name", "people", ["name"]))?;
                v.drop_table("people")
            })
            .unwrap();

        let schema = builder.finish();
        let version = schema.version(1).unwrap();
        assert!(version.snapshot().table("people").is_none());
        assert!(version.snapshot().index("by_name").is_none());
        assert!(version
            .operations()
            .iter()
            .any(|op| matches!(op, Operation::DropIndex { name, .. } if name == "by_name")));
    }

    #[test]
    fn rename_table_rewrites_index_references() {
        let mut builder = SchemaBuilder::new("app");
        builder
            .version(1, |v| {
                v.create_table(people())?;
                v.create_index(Index::new("by_name", "people", ["name"]))?;
                v.rename_table("people", "contacts")
            })
            .unwrap();

        let schema = builder.finish();
        let snapshot = schema.version(1).unwrap().snapshot();
        assert!(snapshot.table("people").is_none());
        assert!(snapshot.table("contacts").is_some());
        assert_eq!(snapshot.index("by_name").unwrap().table, "contacts");
    }

    #[test]
    fn index_columns_are_validated_against_the_working_table() {
        let mut builder = SchemaBuilder::new("app");
        let err = builder
            .version(1, |v| {
                v.create_table(people())?;
                v.create_index(Index::new("bad", "people", ["missing"]))
            })
            .unwrap_err();
        assert!(matches!(err, MigrateError::UnknownColumn { .. }));
    }

    #[test]
    fn alter_table_updates_the_working_snapshot() {
        let mut builder = SchemaBuilder::new("app");
        builder
            .version(1, |v| {
                v.create_table(people())?;
                v.alter_table(
                    "people",
                    TableEdits::new()
                        .alter_column("name", ColumnChange::new().rename_to("full_name")),
                )
            })
            .unwrap();

        let schema = builder.finish();
        let table = schema.version(1).unwrap().snapshot().table("people").unwrap();
        assert!(table.column_named("full_name").is_some());
        assert!(table.column_named("name").is_none());
    }

    #[test]
    fn rename_index_keeps_definition_under_new_name() {
        let mut builder = SchemaBuilder::new("app");
        builder
            .version(1, |v| {
                v.create_table(people())?;
                v.create_index(Index::new("by_name", "people", ["name"]).unique())?;
                v.rename_index("by_name", "people_names")
            })
            .unwrap();

        let schema = builder.finish();
        let snapshot = schema.version(1).unwrap().snapshot();
        assert!(snapshot.index("by_name").is_none());
        let renamed = snapshot.index("people_names").unwrap();
        assert!(renamed.unique);
        assert_eq!(renamed.columns, vec!["name"]);
    }

    #[test]
    fn working_snapshot_carries_across_versions() {
        let mut builder = SchemaBuilder::new("app");
        builder.version(1, |v| v.create_table(people())).unwrap();
        builder
            .version(2, |v| {
                v.alter_table(
                    "people",
                    TableEdits::new().add_column(Column::new("email", ColumnType::Text)),
                )
            })
            .unwrap();

        let schema = builder.finish();
        assert_eq!(
            schema.version(1).unwrap().snapshot().table("people").unwrap().columns.len(),
            2
        );
        assert_eq!(
            schema.version(2).unwrap().snapshot().table("people").unwrap().columns.len(),
            3
        );
    }
}
