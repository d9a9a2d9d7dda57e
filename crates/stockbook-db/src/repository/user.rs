//! # User Repository
//!
//! Accounts that can log in. Password hashing happens in the server; this
//! layer only stores the argon2 PHC string.

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::validation::validate_username;
use stockbook_core::{Role, User};
use tracing::info;

use crate::error::{DbError, DbResult};

/// A user row including the stored password hash. Never serialised.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn create(&self, username: &str, password_hash: &str, role: Role) -> DbResult<User> {
        validate_username(username)?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash, role, is_active, created_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            RETURNING id, username, role, is_active, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(username))?;

        info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> DbResult<User> {
        sqlx::query_as("SELECT id, username, role, is_active, created_at FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Looks up a user for login.
    pub async fn find_credentials(&self, username: &str) -> DbResult<Option<UserCredentials>> {
        let row = sqlx::query_as("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
