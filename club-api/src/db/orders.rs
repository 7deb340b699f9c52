//! Orders and order items

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PAID: &str = "paid";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const ITEM_TICKET: &str = "ticket";
pub const ITEM_PRODUCT: &str = "product";
pub const ITEM_SUBSCRIPTION: &str = "subscription";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    #[serde(rename = "id")]
    pub guid: String,
    pub user_id: Option<String>,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub status: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub coupon_id: Option<String>,
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    #[serde(rename = "id")]
    pub guid: String,
    pub order_id: String,
    /// `ticket`, `product` or `subscription`
    pub item_type: String,
    /// Tier, product or plan id
    pub item_ref: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub async fn insert_order<'e, E>(executor: E, order: &Order) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO orders (guid, user_id, customer_email, customer_name, status, subtotal_cents,
                            discount_cents, total_cents, coupon_id, payment_session_id,
                            created_at, updated_at, paid_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&order.guid)
    .bind(&order.user_id)
    .bind(&order.customer_email)
    .bind(&order.customer_name)
    .bind(&order.status)
    .bind(order.subtotal_cents)
    .bind(order.discount_cents)
    .bind(order.total_cents)
    .bind(&order.coupon_id)
    .bind(&order.payment_session_id)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.paid_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn insert_item<'e, E>(executor: E, item: &OrderItem) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO order_items (guid, order_id, item_type, item_ref, description, quantity, unit_price_cents)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.guid)
    .bind(&item.order_id)
    .bind(&item.item_type)
    .bind(&item.item_ref)
    .bind(&item.description)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_order<'e, E>(executor: E, id: &str) -> sqlx::Result<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM orders WHERE guid = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_order_by_session(pool: &SqlitePool, session_id: &str) -> sqlx::Result<Option<Order>> {
    sqlx::query_as("SELECT * FROM orders WHERE payment_session_id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await
}

pub async fn items_for_order<'e, E>(executor: E, order_id: &str) -> sqlx::Result<Vec<OrderItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = ? ORDER BY item_type, description")
        .bind(order_id)
        .fetch_all(executor)
        .await
}

/// Nest items under their orders with one extra query
pub async fn attach_items(pool: &SqlitePool, orders: Vec<Order>) -> sqlx::Result<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM order_items WHERE order_id IN (");
    let mut separated = query.separated(", ");
    for order in &orders {
        separated.push_bind(order.guid.clone());
    }
    separated.push_unseparated(") ORDER BY item_type, description");

    let items: Vec<OrderItem> = query.build_query_as().fetch_all(pool).await?;

    let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id.clone()).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.guid).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}

pub async fn list_orders_for_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<Order>> {
    sqlx::query_as("SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn count_orders(pool: &SqlitePool, status: Option<&str>) -> sqlx::Result<i64> {
    match status {
        Some(status) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = ?")
                .bind(status)
                .fetch_one(pool)
                .await
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM orders")
                .fetch_one(pool)
                .await
        }
    }
}

/// Ticket units on pending orders for one tier
pub async fn count_pending_tier_units(pool: &SqlitePool, tier_id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(i.quantity), 0)
        FROM order_items i
        JOIN orders o ON o.guid = i.order_id
        WHERE o.status = 'pending' AND i.item_type = 'ticket' AND i.item_ref = ?
        "#,
    )
    .bind(tier_id)
    .fetch_one(pool)
    .await
}

/// Ticket units on pending orders for any tier of one event
pub async fn count_pending_event_units(pool: &SqlitePool, event_id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(i.quantity), 0)
        FROM order_items i
        JOIN orders o ON o.guid = i.order_id
        JOIN pricing_tiers t ON t.guid = i.item_ref
        WHERE o.status = 'pending' AND i.item_type = 'ticket' AND t.event_id = ?
        "#,
    )
    .bind(event_id)
    .fetch_one(pool)
    .await
}

pub async fn list_orders(
    pool: &SqlitePool,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Order>> {
    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM orders");
    if let Some(status) = status {
        query.push(" WHERE status = ").push_bind(status.to_string());
    }
    query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    query.build_query_as().fetch_all(pool).await
}

pub async fn set_payment_session(
    pool: &SqlitePool,
    id: &str,
    session_id: &str,
    now: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE orders SET payment_session_id = ?, updated_at = ? WHERE guid = ?")
        .bind(session_id)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// pending → paid. Returns 0 when the order was not pending, which makes
/// re-delivered webhooks harmless.
pub async fn mark_paid<'e, E>(executor: E, id: &str, now: DateTime<Utc>) -> sqlx::Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE orders SET status = 'paid', paid_at = ?, updated_at = ? WHERE guid = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// pending → cancelled
pub async fn mark_cancelled(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'cancelled', updated_at = ? WHERE guid = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn paid_revenue_cents(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COALESCE(SUM(total_cents), 0) FROM orders WHERE status = 'paid'")
        .fetch_one(pool)
        .await
}

pub async fn recent_orders(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<Order>> {
    sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await
}
