//! `SQLite` schema bootstrap logic.
//!
//! Table definitions use `CREATE TABLE IF NOT EXISTS`, so they can be re-run on
//! every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS workspace_state (
    workspace   TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (workspace, key)
);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
