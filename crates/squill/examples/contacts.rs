//! Declares a three-version contact-book schema and migrates an in-memory
//! database through it, printing what each version executes.
//!
//! Run with: `cargo run --example contacts`

use sqlx::sqlite::SqlitePoolOptions;
use squill::prelude::*;

fn schema() -> Result<Schema> {
    Schema::build("contacts", |s| {
        s.version(1, |v| {
            v.create_table(
                Table::new("people")
                    .column(Column::new("id", ColumnType::Integer))
                    .column(Column::new("name", ColumnType::Text).not_null())
                    .primary_key("id", true),
            )?;
            v.create_index(Index::new("people_names", "people", ["name"]))
        })?;
        s.version(2, |v| {
            // Rename a column and backfill a new one in one block; this
            // compiles to a single table rebuild and the index follows the
            // rename automatically.
            v.alter_table(
                "people",
                TableEdits::new()
                    .alter_column("name", ColumnChange::new().rename_to("full_name"))
                    .add_column_with(
                        Column::new("email", ColumnType::Text),
                        "printf('%s@example.com', lower(\"name\"))",
                    ),
            )
        })?;
        s.version(3, |v| {
            v.create_table(
                Table::new("phones")
                    .column(Column::new("id", ColumnType::Integer))
                    .column(Column::new("person_id", ColumnType::Integer).not_null())
                    .column(Column::new("number", ColumnType::Text).not_null())
                    .primary_key("id", true),
            )?;
            v.create_index(Index::new("phones_by_person", "phones", ["person_id"]))
        })
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let schema = schema()?;

    for version in schema.versions() {
        println!("-- version {}", version.number());
        for sql in schema.statements_for(version.number()).unwrap_or_default() {
            println!("{sql};");
        }
        println!();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;

    schema.migrate(&pool, Some(1), MigrateOptions::default()).await?;
    sqlx::query("INSERT INTO people (name) VALUES ('Abby'), ('Bill')")
        .execute(&pool)
        .await?;

    schema.migrate(&pool, None, MigrateOptions::default()).await?;

    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT full_name, email FROM people ORDER BY id")
            .fetch_all(&pool)
            .await?;
    for (name, email) in rows {
        println!("{name} <{email}>");
    }

    Ok(())
}
