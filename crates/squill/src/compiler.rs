//! The alter-table compiler.
//!
//! The engine's native ALTER TABLE can only append a column or rename a
//! table. Everything else a [`TableEdits`] block may ask for (drop, retype,
//! rename, constraint changes, populating existing rows) has to go through
//! a full table rebuild. This module decides which path an edit block takes
//! and compiles it into operations:
//!
//! - An additive-only block (pure column adds, no set-value expressions, no
//!   constraint changes) compiles to one native ADD COLUMN per column, the
//!   cheap path with no table copy.
//! - Anything else compiles to exactly one [`Operation::AlterTableRebuild`]
//!   covering the whole block, never one rebuild per edit.

use std::collections::{BTreeMap, BTreeSet};

use crate::dialect;
use crate::edits::{ColumnEdit, TableEdits};
use crate::error::{MigrateError, Result};
use crate::model::{Column, ColumnType, Index, Table, TableConstraint};
use crate::operations::{ColumnSource, Operation};
use crate::remap;

/// Output of compiling one alter-table edit block.
#[derive(Debug)]
pub(crate) struct AlterPlan {
    /// Operations realizing the block, in execution order.
    pub(crate) operations: Vec<Operation>,
    /// The table after all edits.
    pub(crate) table: Table,
    /// Indexes that covered a dropped column; gone from the snapshot.
    pub(crate) dropped_indexes: Vec<String>,
    /// Surviving indexes with their columns rewritten.
    pub(crate) recreated_indexes: Vec<Index>,
}

/// One column of the working table during edit replay.
///
/// `key` is the pre-edit name every later edit in the block addresses the
/// column by; it never changes, even when the column itself is renamed.
struct WorkingColumn {
    key: String,
    column: Column,
    set_value: Option<String>,
    /// Whether the column existed before this block and carries data over.
    carried: bool,
}

/// Compiles an edit block against the table's current definition.
///
/// `table_indexes` are the snapshot's indexes covering this table; on the
/// rebuild path they are remapped through the block's column renames.
pub(crate) fn compile_alter(
    table: &Table,
    edits: &TableEdits,
    table_indexes: &[Index],
) -> Result<AlterPlan> {
    if is_additive_only(edits) {
        return compile_additive(table, edits);
    }
    compile_rebuild(table, edits, table_indexes)
}

fn is_additive_only(edits: &TableEdits) -> bool {
    !edits.is_empty()
        && edits
            .edits
            .iter()
            .all(|e| matches!(e, ColumnEdit::Add { set_value: None, .. }))
}

fn compile_additive(table: &Table, edits: &TableEdits) -> Result<AlterPlan> {
    let mut final_table = table.clone();
    let mut operations = Vec::new();

    for edit in &edits.edits {
        let ColumnEdit::Add { column, .. } = edit else {
            unreachable!("additive-only block contains only adds");
        };
        if final_table.column_named(&column.name).is_some() {
            return Err(MigrateError::DuplicateColumn {
                table: table.name.clone(),
                column: column.name.clone(),
            });
        }
        operations.push(Operation::AddColumn {
            table: table.name.clone(),
            column: column.clone(),
        });
        final_table.columns.push(column.clone());
    }

    Ok(AlterPlan {
        operations,
        table: final_table,
        dropped_indexes: Vec::new(),
        recreated_indexes: Vec::new(),
    })
}

fn compile_rebuild(table: &Table, edits: &TableEdits, table_indexes: &[Index]) -> Result<AlterPlan> {
    let mut working: Vec<WorkingColumn> = table
        .columns
        .iter()
        .map(|c| WorkingColumn {
            key: c.name.clone(),
            column: c.clone(),
            set_value: None,
            carried: true,
        })
        .collect();
    let mut constraints = table.constraints.clone();
    let mut primary_key = table.primary_key.clone();

    for edit in &edits.edits {
        match edit {
            ColumnEdit::Add { column, set_value } => {
                if working.iter().any(|w| w.column.name == column.name) {
                    return Err(MigrateError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
                working.push(WorkingColumn {
                    key: column.name.clone(),
                    column: column.clone(),
                    set_value: set_value.clone(),
                    carried: false,
                });
            }

            ColumnEdit::Drop { name } => {
                let position = working.iter().position(|w| w.key == *name).ok_or_else(|| {
                    MigrateError::UnknownColumn {
                        table: table.name.clone(),
                        column: name.clone(),
                    }
                })?;
                let removed = working.remove(position);
                if primary_key
                    .as_ref()
                    .is_some_and(|pk| pk.column == removed.column.name)
                {
                    primary_key = None;
                }
            }

            ColumnEdit::Alter { name, change } => {
                let position = working.iter().position(|w| w.key == *name).ok_or_else(|| {
                    MigrateError::UnknownColumn {
                        table: table.name.clone(),
                        column: name.clone(),
                    }
                })?;

                if let Some(new_name) = &change.rename_to {
                    let collision = working
                        .iter()
                        .enumerate()
                        .any(|(i, w)| i != position && w.column.name == *new_name);
                    if collision {
                        return Err(MigrateError::DuplicateColumn {
                            table: table.name.clone(),
                            column: new_name.clone(),
                        });
                    }
                    let old_name = working[position].column.name.clone();
                    if let Some(pk) = &mut primary_key {
                        if pk.column == old_name {
                            pk.column = new_name.clone();
                        }
                    }
                    working[position].column.name = new_name.clone();
                }
                if let Some(column_type) = change.column_type {
                    working[position].column.column_type = column_type;
                }
                if let Some(clauses) = &change.constraints {
                    working[position].column.constraints = clauses.clone();
                }
                if let Some(expr) = &change.set_value {
                    working[position].set_value = Some(expr.clone());
                }
            }

            ColumnEdit::AddConstraint { constraint } => {
                if let Some(name) = &constraint.name {
                    let exists = constraints
                        .iter()
                        .any(|c| c.name.as_deref() == Some(name.as_str()));
                    if exists {
                        return Err(MigrateError::DuplicateConstraint {
                            table: table.name.clone(),
                            name: name.clone(),
                        });
                    }
                }
                constraints.push(constraint.clone());
            }

            ColumnEdit::DropConstraint { name } => {
                let position = constraints
                    .iter()
                    .position(|c| c.name.as_deref() == Some(name.as_str()))
                    .ok_or_else(|| MigrateError::UnknownConstraint {
                        table: table.name.clone(),
                        name: name.clone(),
                    })?;
                constraints.remove(position);
            }
        }
    }

    if let Some(pk) = &primary_key {
        if pk.autoincrement {
            let pk_column = working.iter().find(|w| w.column.name == pk.column);
            if pk_column.is_some_and(|w| w.column.column_type != ColumnType::Integer) {
                return Err(MigrateError::InvalidPrimaryKey {
                    table: table.name.clone(),
                    column: pk.column.clone(),
                });
            }
        }
    }

    let final_table = Table {
        name: table.name.clone(),
        columns: working.iter().map(|w| w.column.clone()).collect(),
        constraints,
        primary_key,
    };

    // Rename map and dropped set drive both the data copy and index remap.
    let renames: BTreeMap<String, String> = working
        .iter()
        .filter(|w| w.carried)
        .map(|w| (w.key.clone(), w.column.name.clone()))
        .collect();
    let dropped: BTreeSet<String> = table
        .column_names()
        .filter(|name| !renames.contains_key(*name))
        .map(String::from)
        .collect();

    let sources: Vec<ColumnSource> = working
        .iter()
        .filter_map(|w| {
            if let Some(expr) = &w.set_value {
                Some(ColumnSource {
                    column: w.column.name.clone(),
                    expression: expr.clone(),
                })
            } else if w.carried {
                Some(ColumnSource {
                    column: w.column.name.clone(),
                    expression: dialect::quote_ident(&w.key),
                })
            } else {
                // Brand-new column without a set-value expression: filled by
                // its DEFAULT constraint, or NULL.
                None
            }
        })
        .collect();

    let (recreated_indexes, dropped_indexes) = remap::remap_indexes(table_indexes, &renames, &dropped);

    let operation = Operation::AlterTableRebuild {
        original_name: table.name.clone(),
        table: final_table.clone(),
        sources,
        recreate_indexes: recreated_indexes.clone(),
    };

    Ok(AlterPlan {
        operations: vec![operation],
        table: final_table,
        dropped_indexes,
        recreated_indexes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::ColumnChange;

    fn people() -> Table {
        Table::new("people")
            .column(Column::new("id", ColumnType::Integer))
            .column(Column::new("name", ColumnType::Text).not_null())
            .primary_key("id", false)
    }

    fn rebuild_of(plan: &AlterPlan) -> (&Table, &Vec<ColumnSource>, &Vec<Index>) {
        match &plan.operations[0] {
            Operation::AlterTableRebuild {
                table,
                sources,
                recreate_indexes,
                ..
            } => (table, sources, recreate_indexes),
            other => panic!("expected a rebuild, got {other:?}"),
        }
    }

    #[test]
    fn pure_adds_take_the_native_path() {
        let edits = TableEdits::new()
            .add_column(Column::new("email", ColumnType::Text))
            .add_column(Column::new("age", ColumnType::Integer).default_to("0"));

        let plan = compile_alter(&people(), &edits, &[]).unwrap();
        assert_eq!(plan.operations.len(), 2);
        assert!(plan
            .operations
            .iter()
            .all(|op| matches!(op, Operation::AddColumn { .. })));
        assert_eq!(plan.table.columns.len(), 4);
    }

    #[test]
    fn add_with_set_value_forces_a_rebuild() {
        let edits = TableEdits::new().add_column_with(
            Column::new("email", ColumnType::Text),
            "lower(\"name\")",
        );

        let plan = compile_alter(&people(), &edits, &[]).unwrap();
        assert_eq!(plan.operations.len(), 1);
        let (table, sources, _) = rebuild_of(&plan);
        assert_eq!(table.columns.len(), 3);
        assert!(sources
            .iter()
            .any(|s| s.column == "email" && s.expression == "lower(\"name\")"));
    }

    #[test]
    fn multi_edit_block_compiles_to_one_rebuild() {
        let edits = TableEdits::new()
            .alter_column("name", ColumnChange::new().rename_to("full_name"))
            .drop_column("id");

        let plan = compile_alter(&people(), &edits, &[]).unwrap();
        assert_eq!(plan.operations.len(), 1);
        let (table, sources, _) = rebuild_of(&plan);
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.columns[0].name, "full_name");
        assert!(table.primary_key.is_none());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].expression, "\"name\"");
    }

    #[test]
    fn edits_address_columns_by_pre_edit_name() {
        // After the rename, the second edit still refers to "name".
        let edits = TableEdits::new()
            .alter_column("name", ColumnChange::new().rename_to("full_name"))
            .alter_column("name", ColumnChange::new().retype(ColumnType::Blob));

        let plan = compile_alter(&people(), &edits, &[]).unwrap();
        let (table, _, _) = rebuild_of(&plan);
        let column = table.column_named("full_name").unwrap();
        assert_eq!(column.column_type, ColumnType::Blob);
    }

    #[test]
    fn post_edit_name_is_not_addressable() {
        let edits = TableEdits::new()
            .alter_column("name", ColumnChange::new().rename_to("full_name"))
            .drop_column("full_name");

        let err = compile_alter(&people(), &edits, &[]).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::UnknownColumn { ref column, .. } if column == "full_name"
        ));
    }

    #[test]
    fn drop_then_add_same_name_is_well_defined() {
        let edits = TableEdits::new()
            .drop_column("name")
            .add_column(Column::new("name", ColumnType::Blob));

        let plan = compile_alter(&people(), &edits, &[]).unwrap();
        let (table, sources, _) = rebuild_of(&plan);
        let column = table.column_named("name").unwrap();
        assert_eq!(column.column_type, ColumnType::Blob);
        // The re-added column carries no data from the dropped one.
        assert!(!sources.iter().any(|s| s.column == "name"));
    }

    #[test]
    fn unknown_column_fails_before_touching_the_database() {
        let edits = TableEdits::new().drop_column("missing");
        let err = compile_alter(&people(), &edits, &[]).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::UnknownColumn { ref table, ref column }
                if table == "people" && column == "missing"
        ));
    }

    #[test]
    fn rename_collision_is_rejected() {
        let edits =
            TableEdits::new().alter_column("name", ColumnChange::new().rename_to("id"));
        let err = compile_alter(&people(), &edits, &[]).unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateColumn { .. }));
    }

    #[test]
    fn rename_follows_into_primary_key() {
        let edits = TableEdits::new().alter_column("id", ColumnChange::new().rename_to("pk"));
        let plan = compile_alter(&people(), &edits, &[]).unwrap();
        assert_eq!(plan.table.primary_key.as_ref().unwrap().column, "pk");
    }

    #[test]
    fn retyping_an_autoincrement_key_is_rejected() {
        let table = Table::new("people")
            .column(Column::new("id", ColumnType::Integer))
            .primary_key("id", true);
        let edits = TableEdits::new().alter_column("id", ColumnChange::new().retype(ColumnType::Text));

        let err = compile_alter(&table, &edits, &[]).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidPrimaryKey { .. }));
    }

    #[test]
    fn indexes_ride_along_remapped() {
        let indexes = vec![
            Index::new("by_name", "people", ["name"]).unique(),
            Index::new("by_id", "people", ["id"]),
        ];
        let edits = TableEdits::new()
            .alter_column("name", ColumnChange::new().rename_to("full_name"))
            .drop_column("id");

        let plan = compile_alter(&people(), &edits, &indexes).unwrap();
        let (_, _, recreate) = rebuild_of(&plan);
        assert_eq!(recreate.len(), 1);
        assert_eq!(recreate[0].name, "by_name");
        assert_eq!(recreate[0].columns, vec!["full_name"]);
        assert_eq!(plan.dropped_indexes, vec!["by_id"]);
    }

    #[test]
    fn constraint_add_and_drop_require_a_rebuild() {
        let edits = TableEdits::new()
            .add_constraint(TableConstraint::named("name_unique", "UNIQUE (name)"));
        let plan = compile_alter(&people(), &edits, &[]).unwrap();
        assert!(matches!(
            plan.operations[0],
            Operation::AlterTableRebuild { .. }
        ));
        assert_eq!(plan.table.constraints.len(), 1);

        let table = plan.table;
        let edits = TableEdits::new().drop_constraint("name_unique");
        let plan = compile_alter(&table, &edits, &[]).unwrap();
        assert!(plan.table.constraints.is_empty());
    }

    #[test]
    fn dropping_an_unknown_constraint_fails() {
        let edits = TableEdits::new().drop_constraint("missing");
        let err = compile_alter(&people(), &edits, &[]).unwrap_err();
        assert!(matches!(err, MigrateError::UnknownConstraint { .. }));
    }
}
