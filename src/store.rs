use crate::core::errors::Result;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Executor, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// Opens (creating if necessary) the sqlite database backing users and
/// internal configuration.
pub async fn open(path: impl AsRef<Path>) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!(
        "sqlite:{}",
        path.as_ref().to_string_lossy()
    ))?
    .create_if_missing(true)
    .journal_mode(SqliteJournalMode::Wal)
    .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Creates the schema when it does not exist yet.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
CREATE TABLE IF NOT EXISTS users
(
    id          INTEGER PRIMARY KEY,
    username    TEXT    NOT NULL,
    password    TEXT    NOT NULL,
    permissions INTEGER NOT NULL
)
"#,
    )
    .await?;

    pool.execute(
        r#"
CREATE TABLE IF NOT EXISTS internal_configuration
(
    key   TEXT PRIMARY KEY UNIQUE,
    value TEXT DEFAULT NULL
)
"#,
    )
    .await?;

    Ok(())
}
