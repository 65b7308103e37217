//! Persisted schema-version bookkeeping.
//!
//! The current version of each schema is a single integer in a small
//! bookkeeping table, keyed by the schema identifier so several schemas can
//! share one database. Reads default to 0 when no row exists; writes happen
//! inside the migration transaction so a rolled-back run never moves the
//! counter.

use sqlx::sqlite::SqliteConnection;

pub(crate) const VERSIONS_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS squill_versions (
    identifier TEXT PRIMARY KEY NOT NULL,
    version INTEGER NOT NULL
)";

pub(crate) async fn ensure_table(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    sqlx::query(VERSIONS_TABLE_SQL).execute(&mut *conn).await?;
    Ok(())
}

pub(crate) async fn read(conn: &mut SqliteConnection, identifier: &str) -> sqlx::Result<i64> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT version FROM squill_versions WHERE identifier = ?")
            .bind(identifier)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.map_or(0, |(version,)| version))
}

pub(crate) async fn write(
    conn: &mut SqliteConnection,
    identifier: &str,
    version: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO squill_versions (identifier, version) VALUES (?, ?) \
         ON CONFLICT(identifier) DO UPDATE SET version = excluded.version",
    )
    .bind(identifier)
    .bind(version)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
