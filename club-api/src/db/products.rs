//! Shop products

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    #[serde(rename = "id")]
    pub guid: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert_product(pool: &SqlitePool, product: &Product) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products (guid, name, description, price_cents, stock, image_url, is_active,
                              created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&product.guid)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price_cents)
    .bind(product.stock)
    .bind(&product.image_url)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_product(pool: &SqlitePool, product: &Product) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE products SET name = ?, description = ?, price_cents = ?, stock = ?, image_url = ?,
                            is_active = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price_cents)
    .bind(product.stock)
    .bind(&product.image_url)
    .bind(product.is_active)
    .bind(product.updated_at)
    .bind(&product.guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find_product<'e, E>(executor: E, id: &str) -> sqlx::Result<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM products WHERE guid = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_products(pool: &SqlitePool, active_only: bool) -> sqlx::Result<Vec<Product>> {
    let sql = if active_only {
        "SELECT * FROM products WHERE is_active = 1 ORDER BY name ASC"
    } else {
        "SELECT * FROM products ORDER BY name ASC"
    };
    sqlx::query_as(sql).fetch_all(pool).await
}

pub async fn delete_product(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM products WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// `stock -= quantity`; the table CHECK rejects negative stock
pub async fn decrement_stock<'e, E>(executor: E, id: &str, quantity: i64) -> sqlx::Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE products SET stock = stock - ? WHERE guid = ?")
        .bind(quantity)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn count_low_stock(pool: &SqlitePool, threshold: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1 AND stock <= ?")
        .bind(threshold)
        .fetch_one(pool)
        .await
}
