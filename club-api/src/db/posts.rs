//! News posts

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    #[serde(rename = "id")]
    pub guid: String,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub cover_image_url: Option<String>,
    pub author_id: Option<String>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert_post(pool: &SqlitePool, post: &Post) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO posts (guid, slug, title, excerpt, body, cover_image_url, author_id,
                           is_published, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.guid)
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.body)
    .bind(&post.cover_image_url)
    .bind(&post.author_id)
    .bind(post.is_published)
    .bind(post.published_at)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_post(pool: &SqlitePool, post: &Post) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE posts SET slug = ?, title = ?, excerpt = ?, body = ?, cover_image_url = ?,
                         is_published = ?, published_at = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.body)
    .bind(&post.cover_image_url)
    .bind(post.is_published)
    .bind(post.published_at)
    .bind(post.updated_at)
    .bind(&post.guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find_post(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE guid = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_published_by_slug(pool: &SqlitePool, slug: &str) -> sqlx::Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE slug = ? AND is_published = 1")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

pub async fn slug_exists(pool: &SqlitePool, slug: &str) -> sqlx::Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

pub async fn count_published(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE is_published = 1")
        .fetch_one(pool)
        .await
}

/// Newest first
pub async fn list_published(pool: &SqlitePool, limit: i64, offset: i64) -> sqlx::Result<Vec<Post>> {
    sqlx::query_as(
        "SELECT * FROM posts WHERE is_published = 1 ORDER BY published_at DESC, created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_all_posts(pool: &SqlitePool) -> sqlx::Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn delete_post(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM posts WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
