//! Discount coupons

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Coupon {
    #[serde(rename = "id")]
    pub guid: String,
    pub code: String,
    /// `percent` or `fixed`
    pub discount_type: String,
    /// Percentage points for `percent`, cents for `fixed`
    pub discount_value: i64,
    pub min_order_cents: i64,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_coupon(pool: &SqlitePool, coupon: &Coupon) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO coupons (guid, code, discount_type, discount_value, min_order_cents, max_uses,
                             used_count, valid_from, valid_until, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&coupon.guid)
    .bind(&coupon.code)
    .bind(&coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.min_order_cents)
    .bind(coupon.max_uses)
    .bind(coupon.used_count)
    .bind(coupon.valid_from)
    .bind(coupon.valid_until)
    .bind(coupon.is_active)
    .bind(coupon.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_coupon(pool: &SqlitePool, coupon: &Coupon) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE coupons SET code = ?, discount_type = ?, discount_value = ?, min_order_cents = ?,
                           max_uses = ?, valid_from = ?, valid_until = ?, is_active = ?
        WHERE guid = ?
        "#,
    )
    .bind(&coupon.code)
    .bind(&coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.min_order_cents)
    .bind(coupon.max_uses)
    .bind(coupon.valid_from)
    .bind(coupon.valid_until)
    .bind(coupon.is_active)
    .bind(&coupon.guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find_coupon(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Coupon>> {
    sqlx::query_as("SELECT * FROM coupons WHERE guid = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Case-insensitive lookup (the column is `COLLATE NOCASE`)
pub async fn find_coupon_by_code(pool: &SqlitePool, code: &str) -> sqlx::Result<Option<Coupon>> {
    sqlx::query_as("SELECT * FROM coupons WHERE code = ?")
        .bind(code.trim())
        .fetch_optional(pool)
        .await
}

pub async fn list_coupons(pool: &SqlitePool) -> sqlx::Result<Vec<Coupon>> {
    sqlx::query_as("SELECT * FROM coupons ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn delete_coupon(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM coupons WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Count one use unless the cap is already reached; 0 rows means over the cap
pub async fn increment_usage<'e, E>(executor: E, id: &str) -> sqlx::Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE coupons SET used_count = used_count + 1 \
         WHERE guid = ? AND (max_uses IS NULL OR used_count < max_uses)",
    )
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
