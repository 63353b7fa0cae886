use crate::auth::Permission;
use crate::core::errors::Result;
use bcrypt::DEFAULT_COST;
use enumflags2::BitFlags;
use serde_json::json;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

/// A stored account. `password_hash` is a bcrypt hash; the cleartext never
/// leaves the login handler.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub permissions: BitFlags<Permission>,
}

impl FromRow<'_, SqliteRow> for User {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let permissions_raw: i64 = row.try_get("permissions")?;
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password")?,
            permissions: BitFlags::from_bits_truncate(permissions_raw as u8),
        })
    }
}

impl User {
    pub async fn create(
        pool: &SqlitePool,
        username: &str,
        password: &str,
        permissions: BitFlags<Permission>,
    ) -> Result<()> {
        let password_hash = bcrypt::hash(password, DEFAULT_COST)?;
        sqlx::query("insert into users (username, password, permissions) values (?, ?, ?)")
            .bind(username)
            .bind(&password_hash)
            .bind(permissions.bits() as i64)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>> {
        let users = sqlx::query_as::<_, Self>("select * from users")
            .fetch_all(pool)
            .await?;
        Ok(users)
    }

    pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>("select * from users where username = ? limit 1")
            .bind(username)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn exists(pool: &SqlitePool, username: &str) -> Result<bool> {
        Ok(Self::get_by_username(pool, username).await?.is_some())
    }

    /// Writes the current password hash and permissions back to the row.
    pub async fn update(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query("update users set password = ?, permissions = ? where username = ?")
            .bind(&self.password_hash)
            .bind(self.permissions.bits() as i64)
            .bind(&self.username)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query("delete from users where username = ?")
            .bind(&self.username)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = bcrypt::hash(password, DEFAULT_COST)?;
        Ok(())
    }

    pub fn verify_password(&self, password: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, &self.password_hash)?)
    }

    /// Issues a session token bound to this account and the requesting host.
    /// The token is a bcrypt hash of a canonical payload, so it is
    /// invalidated by a password change without any server-side session
    /// table.
    pub fn issue_token(&self, host: &str) -> Result<String> {
        Ok(bcrypt::hash(self.token_payload(host), DEFAULT_COST)?)
    }

    /// Checks a presented token. Malformed tokens verify as false rather
    /// than erroring, so the auth layer treats them as unauthenticated.
    pub fn verify_token(&self, host: &str, token: &str) -> bool {
        bcrypt::verify(self.token_payload(host), token).unwrap_or(false)
    }

    fn token_payload(&self, host: &str) -> String {
        json!({
            "id": self.id,
            "username": self.username,
            "password": self.password_hash,
            "host": host,
        })
        .to_string()
    }
}
