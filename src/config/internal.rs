use crate::core::errors::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

const FIRST_RUN_KEY: &str = "has_done_first_run_setup";

/// Internal application state the user never edits directly, stored in the
/// `internal_configuration` key/value table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalState {
    pub has_done_first_run_setup: bool,
}

impl InternalState {
    /// Reads the current state; missing keys fall back to defaults so a fresh
    /// database reports the setup wizard as pending.
    pub async fn fetch(pool: &SqlitePool) -> Self {
        let has_done_first_run_setup = match get(pool, FIRST_RUN_KEY).await {
            Ok(Some(value)) => value.parse().unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("failed to read internal configuration: {e}");
                false
            }
        };
        Self {
            has_done_first_run_setup,
        }
    }

    pub async fn complete_first_run_setup(pool: &SqlitePool) -> Result<()> {
        set(pool, FIRST_RUN_KEY, "true").await
    }
}

async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT value FROM internal_configuration WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(value,)| value))
}

async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO internal_configuration (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
