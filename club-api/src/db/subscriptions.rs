//! Membership plans and subscriptions

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_EXPIRED: &str = "expired";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionPlan {
    #[serde(rename = "id")]
    pub guid: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_days: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    #[serde(rename = "id")]
    pub guid: String,
    pub user_id: String,
    pub plan_id: String,
    pub order_id: Option<String>,
    pub status: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub qr_token: String,
    #[serde(skip)]
    pub card_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub subscription: Subscription,
    pub plan_name: String,
    pub user_email: String,
    pub user_name: Option<String>,
}

impl SubscriptionDetails {
    /// Report rows past their end date as expired even before the sweep runs
    pub fn with_effective_status(mut self, now: DateTime<Utc>) -> Self {
        if self.subscription.status == STATUS_ACTIVE && self.subscription.ends_at <= now {
            self.subscription.status = STATUS_EXPIRED.to_string();
        }
        self
    }
}

const DETAILS_SELECT: &str = r#"
    SELECT s.*, p.name AS plan_name, u.email AS user_email, u.full_name AS user_name
    FROM subscriptions s
    JOIN subscription_plans p ON p.guid = s.plan_id
    JOIN users u ON u.guid = s.user_id
"#;

// ============================================================================
// Plans
// ============================================================================

pub async fn insert_plan(pool: &SqlitePool, plan: &SubscriptionPlan) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO subscription_plans (guid, name, description, price_cents, duration_days, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&plan.guid)
    .bind(&plan.name)
    .bind(&plan.description)
    .bind(plan.price_cents)
    .bind(plan.duration_days)
    .bind(plan.is_active)
    .bind(plan.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_plan(pool: &SqlitePool, plan: &SubscriptionPlan) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE subscription_plans SET name = ?, description = ?, price_cents = ?, duration_days = ?, is_active = ?
        WHERE guid = ?
        "#,
    )
    .bind(&plan.name)
    .bind(&plan.description)
    .bind(plan.price_cents)
    .bind(plan.duration_days)
    .bind(plan.is_active)
    .bind(&plan.guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find_plan<'e, E>(executor: E, id: &str) -> sqlx::Result<Option<SubscriptionPlan>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM subscription_plans WHERE guid = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_plans(pool: &SqlitePool, active_only: bool) -> sqlx::Result<Vec<SubscriptionPlan>> {
    let sql = if active_only {
        "SELECT * FROM subscription_plans WHERE is_active = 1 ORDER BY price_cents ASC"
    } else {
        "SELECT * FROM subscription_plans ORDER BY price_cents ASC"
    };
    sqlx::query_as(sql).fetch_all(pool).await
}

pub async fn delete_plan(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM subscription_plans WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ============================================================================
// Subscriptions
// ============================================================================

pub async fn insert_subscription<'e, E>(executor: E, subscription: &Subscription) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO subscriptions (guid, user_id, plan_id, order_id, status, starts_at, ends_at,
                                   qr_token, card_path, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&subscription.guid)
    .bind(&subscription.user_id)
    .bind(&subscription.plan_id)
    .bind(&subscription.order_id)
    .bind(&subscription.status)
    .bind(subscription.starts_at)
    .bind(subscription.ends_at)
    .bind(&subscription.qr_token)
    .bind(&subscription.card_path)
    .bind(subscription.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_subscription_details(
    pool: &SqlitePool,
    id: &str,
) -> sqlx::Result<Option<SubscriptionDetails>> {
    sqlx::query_as(&format!("{} WHERE s.guid = ?", DETAILS_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_subscriptions_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> sqlx::Result<Vec<SubscriptionDetails>> {
    sqlx::query_as(&format!("{} WHERE s.user_id = ? ORDER BY s.ends_at DESC", DETAILS_SELECT))
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn list_subscriptions_for_order(
    pool: &SqlitePool,
    order_id: &str,
) -> sqlx::Result<Vec<SubscriptionDetails>> {
    sqlx::query_as(&format!("{} WHERE s.order_id = ?", DETAILS_SELECT))
        .bind(order_id)
        .fetch_all(pool)
        .await
}

pub async fn list_all_subscriptions(pool: &SqlitePool) -> sqlx::Result<Vec<SubscriptionDetails>> {
    sqlx::query_as(&format!("{} ORDER BY s.created_at DESC", DETAILS_SELECT))
        .fetch_all(pool)
        .await
}

pub async fn set_card_path(pool: &SqlitePool, id: &str, path: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE subscriptions SET card_path = ? WHERE guid = ?")
        .bind(path)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Flip active rows past their end date to expired
pub async fn expire_due(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<u64> {
    let result = sqlx::query("UPDATE subscriptions SET status = 'expired' WHERE status = 'active' AND ends_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn count_active(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE status = 'active' AND ends_at > ?")
        .bind(now)
        .fetch_one(pool)
        .await
}
