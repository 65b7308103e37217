//! SQL generation for migration operations.
//!
//! The target engine's ALTER TABLE can only add a column or rename a table.
//! Everything else the operation set expresses is generated here in terms of
//! those two primitives plus CREATE/DROP: a rebuild becomes create-temp,
//! copy-data, drop-original, rename-into-place, index recreation.

use crate::model::{Column, Index, PrimaryKey, Table};
use crate::operations::Operation;

/// Quotes an identifier, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Temporary name a table is rebuilt under before the rename-into-place.
pub(crate) fn rebuild_table_name(original: &str) -> String {
    format!("{original}_squill_rebuild")
}

fn column_definition(column: &Column, primary_key: Option<&PrimaryKey>) -> String {
    let mut parts = vec![quote_ident(&column.name)];

    let type_name = column.column_type.sql_name();
    if !type_name.is_empty() {
        parts.push(type_name.to_string());
    }

    if let Some(pk) = primary_key {
        if pk.column == column.name {
            parts.push("PRIMARY KEY".to_string());
            if pk.autoincrement {
                parts.push("AUTOINCREMENT".to_string());
            }
        }
    }

    for clause in &column.constraints {
        parts.push(clause.clone());
    }

    parts.join(" ")
}

fn create_table_sql_named(table: &Table, name: &str) -> String {
    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_definition(c, table.primary_key.as_ref()))
        .collect();

    for constraint in &table.constraints {
        match &constraint.name {
            Some(constraint_name) => defs.push(format!(
                "CONSTRAINT {} {}",
                quote_ident(constraint_name),
                constraint.definition
            )),
            None => defs.push(constraint.definition.clone()),
        }
    }

    format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_ident(name),
        defs.join(",\n  ")
    )
}

pub(crate) fn create_table_sql(table: &Table) -> String {
    create_table_sql_named(table, &table.name)
}

pub(crate) fn drop_table_sql(name: &str, if_exists: bool) -> String {
    let mut sql = String::from("DROP TABLE ");
    if if_exists {
        sql.push_str("IF EXISTS ");
    }
    sql.push_str(&quote_ident(name));
    sql
}

fn rename_table_sql(old_name: &str, new_name: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(old_name),
        quote_ident(new_name)
    )
}

fn add_column_sql(table: &str, column: &Column) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        column_definition(column, None)
    )
}

pub(crate) fn create_index_sql(index: &Index, if_not_exists: bool) -> String {
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX ");
    if if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    sql.push_str(&quote_ident(&index.name));
    sql.push_str(" ON ");
    sql.push_str(&quote_ident(&index.table));
    sql.push_str(" (");
    let quoted: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
    sql.push_str(&quoted.join(", "));
    sql.push(')');

    if let Some(predicate) = &index.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(predicate);
    }

    sql
}

pub(crate) fn drop_index_sql(name: &str, if_exists: bool) -> String {
    let mut sql = String::from("DROP INDEX ");
    if if_exists {
        sql.push_str("IF EXISTS ");
    }
    sql.push_str(&quote_ident(name));
    sql
}

/// Generates the native statements for one operation, in execution order.
///
/// [`Operation::Execute`] produces no SQL here; the executor runs its step
/// directly against the connection.
pub(crate) fn statements(operation: &Operation) -> Vec<String> {
    match operation {
        Operation::CreateTable { table } => vec![create_table_sql(table)],

        Operation::DropTable { name, if_exists } => vec![drop_table_sql(name, *if_exists)],

        Operation::RenameTable { old_name, new_name } => {
            vec![rename_table_sql(old_name, new_name)]
        }

        Operation::AddColumn { table, column } => vec![add_column_sql(table, column)],

        Operation::AlterTableRebuild {
            original_name,
            table,
            sources,
            recreate_indexes,
        } => {
            let temp = rebuild_table_name(original_name);
            let mut out = vec![create_table_sql_named(table, &temp)];

            if !sources.is_empty() {
                let columns: Vec<String> =
                    sources.iter().map(|s| quote_ident(&s.column)).collect();
                let expressions: Vec<String> =
                    sources.iter().map(|s| s.expression.clone()).collect();
                out.push(format!(
                    "INSERT INTO {} ({}) SELECT {} FROM {}",
                    quote_ident(&temp),
                    columns.join(", "),
                    expressions.join(", "),
                    quote_ident(original_name)
                ));
            }

            out.push(drop_table_sql(original_name, false));
            out.push(rename_table_sql(&temp, &table.name));

            for index in recreate_indexes {
                out.push(create_index_sql(index, false));
            }

            out
        }

        Operation::CreateIndex {
            index,
            if_not_exists,
        } => vec![create_index_sql(index, *if_not_exists)],

        Operation::DropIndex { name, if_exists } => vec![drop_index_sql(name, *if_exists)],

        Operation::RenameIndex { old_name, index } => vec![
            drop_index_sql(old_name, false),
            create_index_sql(index, false),
        ],

        Operation::Execute { .. } => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, TableConstraint};
    use crate::operations::ColumnSource;

    fn people() -> Table {
        Table::new("people")
            .column(Column::new("id", ColumnType::Integer))
            .column(Column::new("name", ColumnType::Text).not_null())
            .primary_key("id", true)
    }

    #[test]
    fn create_table() {
        let sql = create_table_sql(&people());
        assert_eq!(
            sql,
            "CREATE TABLE \"people\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \"name\" TEXT NOT NULL\n)"
        );
    }

    #[test]
    fn create_table_with_named_constraint() {
        let table = Table::new("pairs")
            .column(Column::new("a", ColumnType::Integer))
            .column(Column::new("b", ColumnType::Integer))
            .constraint(TableConstraint::named("pair_unique", "UNIQUE (a, b)"));

        let sql = create_table_sql(&table);
        assert!(sql.contains("CONSTRAINT \"pair_unique\" UNIQUE (a, b)"));
    }

    #[test]
    fn untyped_column_has_no_type_keyword() {
        let table = Table::new("t").column(Column::new("payload", ColumnType::Any));
        let sql = create_table_sql(&table);
        assert!(sql.contains("\"payload\"\n"));
        assert!(!sql.contains("\"payload\" "));
    }

    #[test]
    fn rename_table() {
        let op = Operation::RenameTable {
            old_name: "people".to_string(),
            new_name: "contacts".to_string(),
        };
        assert_eq!(
            statements(&op),
            vec!["ALTER TABLE \"people\" RENAME TO \"contacts\""]
        );
    }

    #[test]
    fn add_column() {
        let op = Operation::AddColumn {
            table: "people".to_string(),
            column: Column::new("email", ColumnType::Text).default_to("''"),
        };
        assert_eq!(
            statements(&op),
            vec!["ALTER TABLE \"people\" ADD COLUMN \"email\" TEXT DEFAULT ''"]
        );
    }

    #[test]
    fn rebuild_sequence_is_ordered() {
        let table = Table::new("people")
            .column(Column::new("id", ColumnType::Integer))
            .column(Column::new("full_name", ColumnType::Text).not_null())
            .primary_key("id", false);
        let op = Operation::AlterTableRebuild {
            original_name: "people".to_string(),
            table,
            sources: vec![
                ColumnSource {
                    column: "id".to_string(),
                    expression: "\"id\"".to_string(),
                },
                ColumnSource {
                    column: "full_name".to_string(),
                    expression: "\"name\"".to_string(),
                },
            ],
            recreate_indexes: vec![Index::new("people_names", "people", ["full_name"]).unique()],
        };

        let sql = statements(&op);
        assert_eq!(sql.len(), 5);
        assert!(sql[0].starts_with("CREATE TABLE \"people_squill_rebuild\""));
        assert_eq!(
            sql[1],
            "INSERT INTO \"people_squill_rebuild\" (\"id\", \"full_name\") \
             SELECT \"id\", \"name\" FROM \"people\""
        );
        assert_eq!(sql[2], "DROP TABLE \"people\"");
        assert_eq!(
            sql[3],
            "ALTER TABLE \"people_squill_rebuild\" RENAME TO \"people\""
        );
        assert_eq!(
            sql[4],
            "CREATE UNIQUE INDEX \"people_names\" ON \"people\" (\"full_name\")"
        );
    }

    #[test]
    fn rebuild_without_sources_skips_the_copy() {
        let op = Operation::AlterTableRebuild {
            original_name: "empty".to_string(),
            table: Table::new("empty").column(Column::new("x", ColumnType::Integer)),
            sources: Vec::new(),
            recreate_indexes: Vec::new(),
        };

        let sql = statements(&op);
        assert_eq!(sql.len(), 3);
        assert!(!sql.iter().any(|s| s.starts_with("INSERT")));
    }

    #[test]
    fn partial_index() {
        let index = Index::new("active_names", "people", ["name"])
            .where_clause("active = 1");
        assert_eq!(
            create_index_sql(&index, true),
            "CREATE INDEX IF NOT EXISTS \"active_names\" ON \"people\" (\"name\") WHERE active = 1"
        );
    }

    #[test]
    fn rename_index_is_drop_then_create() {
        let op = Operation::RenameIndex {
            old_name: "old_idx".to_string(),
            index: Index::new("new_idx", "people", ["name"]),
        };
        let sql = statements(&op);
        assert_eq!(sql[0], "DROP INDEX \"old_idx\"");
        assert_eq!(sql[1], "CREATE INDEX \"new_idx\" ON \"people\" (\"name\")");
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn execute_has_no_sql() {
        let op = Operation::Execute {
            step: crate::operations::ExecuteStep::sql("SELECT 1"),
        };
        assert!(statements(&op).is_empty());
    }
}
