//! User accounts

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

pub const ROLE_MEMBER: &str = "member";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    #[serde(rename = "id")]
    pub guid: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub async fn insert_user(pool: &SqlitePool, user: &User) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (guid, email, full_name, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.guid)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_user(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE guid = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Case-insensitive (the column is `COLLATE NOCASE`)
pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email.trim())
        .fetch_optional(pool)
        .await
}

pub async fn list_users(pool: &SqlitePool) -> sqlx::Result<Vec<User>> {
    sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

/// Returns false when no such user exists
pub async fn set_role(pool: &SqlitePool, id: &str, role: &str, now: DateTime<Utc>) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE guid = ?")
        .bind(role)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_users(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}
