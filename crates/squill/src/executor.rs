//! Migration executor.
//!
//! Walks the operation lists of the versions between the recorded and the
//! target version, applying each operation against the live database inside
//! a single transaction. The persisted version number is written last, as
//! part of the same transaction, so a failed run leaves no trace: no
//! partial structural changes, no partial data copies, no stale counter.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::dialect;
use crate::error::{MigrateError, Result};
use crate::operations::Operation;
use crate::schema::{Schema, Version};
use crate::store;

/// Options controlling a migration run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// When the recorded version is not one this schema declares (negative
    /// or above the latest), drop every table and index the schema knows
    /// about and migrate from an empty database instead of treating the
    /// recorded version as 0.
    pub reset_unknown_versions: bool,
}

pub(crate) async fn migrate(
    schema: &Schema,
    pool: &SqlitePool,
    to_version: Option<i64>,
    options: MigrateOptions,
) -> Result<bool> {
    let latest = schema.latest_version().map_or(0, Version::number);
    let target = to_version.unwrap_or(latest);
    if target < 0 || target > latest {
        return Err(MigrateError::TargetOutOfRange {
            requested: target,
            latest,
        });
    }

    let mut conn = pool.acquire().await?;
    store::ensure_table(&mut conn).await?;
    let recorded = store::read(&mut conn, schema.identifier()).await?;
    drop(conn);

    let unknown = recorded < 0 || recorded > latest;
    let current = if unknown { 0 } else { recorded };
    let needs_reset = (unknown && options.reset_unknown_versions) || target < current;

    if !needs_reset && current == target {
        info!(
            schema = schema.identifier(),
            version = current,
            "already at target version, no migration performed"
        );
        return Ok(false);
    }

    info!(
        schema = schema.identifier(),
        from = current,
        to = target,
        reset = needs_reset,
        "migrating"
    );

    let mut tx = pool.begin().await?;
    let from = if needs_reset {
        drop_known_objects(schema, &mut tx).await?;
        0
    } else {
        current
    };

    for version in schema.versions_in_range(from, target) {
        apply_version(version, &mut tx).await?;
    }

    store::write(&mut tx, schema.identifier(), target).await?;
    tx.commit().await?;

    info!(
        schema = schema.identifier(),
        version = target,
        "migration committed"
    );
    Ok(true)
}

pub(crate) async fn reset(schema: &Schema, pool: &SqlitePool) -> Result<()> {
    info!(schema = schema.identifier(), "resetting schema");

    let mut tx = pool.begin().await?;
    store::ensure_table(&mut tx).await?;
    drop_known_objects(schema, &mut tx).await?;
    store::write(&mut tx, schema.identifier(), 0).await?;
    tx.commit().await?;
    Ok(())
}

async fn apply_version(version: &Version, conn: &mut SqliteConnection) -> Result<()> {
    info!(version = version.number(), "applying version");

    for operation in version.operations() {
        debug!(operation = %operation.description(), "applying operation");

        if let Operation::Execute { step } = operation {
            step.run(conn).await.map_err(|source| MigrateError::OperationFailed {
                version: version.number(),
                operation: operation.description(),
                source,
            })?;
            continue;
        }

        for sql in dialect::statements(operation) {
            debug!(sql = %sql, "executing");
            sqlx::query(&sql).execute(&mut *conn).await.map_err(|source| {
                MigrateError::OperationFailed {
                    version: version.number(),
                    operation: operation.description(),
                    source,
                }
            })?;
        }
    }

    Ok(())
}

async fn drop_known_objects(schema: &Schema, conn: &mut SqliteConnection) -> Result<()> {
    for name in schema.known_indexes() {
        let sql = dialect::drop_index_sql(&name, true);
        debug!(sql = %sql, "dropping known index");
        sqlx::query(&sql).execute(&mut *conn).await?;
    }
    for name in schema.known_tables() {
        let sql = dialect::drop_table_sql(&name, true);
        debug!(sql = %sql, "dropping known table");
        sqlx::query(&sql).execute(&mut *conn).await?;
    }
    Ok(())
}
