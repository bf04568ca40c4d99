//! Per-workspace key/value state for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::host::BoxFuture;
use crate::{AppError, Result};

use super::db::Database;
use super::StateStore;

/// Repository storing string arrays under a key, scoped to one workspace.
#[derive(Clone)]
pub struct StateRepo {
    db: Arc<Database>,
    workspace: String,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct StateRow {
    value: String,
}

impl StateRepo {
    /// Create a repository bound to `workspace`.
    #[must_use]
    pub fn new(db: Arc<Database>, workspace: impl Into<String>) -> Self {
        Self {
            db,
            workspace: workspace.into(),
        }
    }

    /// Read the array stored under `key`; an absent key reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the stored value is not
    /// a JSON array of strings.
    pub async fn load(&self, key: &str) -> Result<Vec<String>> {
        let row: Option<StateRow> =
            sqlx::query_as("SELECT value FROM workspace_state WHERE workspace = ?1 AND key = ?2")
                .bind(&self.workspace)
                .bind(key)
                .fetch_optional(self.db.as_ref())
                .await?;

        match row {
            Some(row) => serde_json::from_str(&row.value)
                .map_err(|e| AppError::Db(format!("invalid state value for `{key}`: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the array stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn store(&self, key: &str, value: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|e| AppError::Db(format!("failed to encode state value: {e}")))?;
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO workspace_state (workspace, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (workspace, key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(&self.workspace)
        .bind(key)
        .bind(&encoded)
        .bind(&updated_at)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }
}

impl StateStore for StateRepo {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(self.load(key))
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<String>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.store(key, &value).await })
    }
}
