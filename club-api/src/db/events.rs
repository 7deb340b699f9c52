//! Events and their pricing tiers

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Event {
    #[serde(rename = "id")]
    pub guid: String,
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PricingTier {
    #[serde(rename = "id")]
    pub guid: String,
    pub event_id: String,
    pub name: String,
    pub price_cents: i64,
    pub quantity: i64,
    pub sold: i64,
    pub created_at: DateTime<Utc>,
}

impl PricingTier {
    pub fn remaining(&self) -> i64 {
        (self.quantity - self.sold).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierView {
    #[serde(flatten)]
    pub tier: PricingTier,
    pub remaining: i64,
}

impl From<PricingTier> for TierView {
    fn from(tier: PricingTier) -> Self {
        let remaining = tier.remaining();
        Self { tier, remaining }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventWithTiers {
    #[serde(flatten)]
    pub event: Event,
    pub pricing_tiers: Vec<TierView>,
}

// ============================================================================
// Events
// ============================================================================

pub async fn insert_event<'e, E>(executor: E, event: &Event) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO events (guid, title, description, venue, starts_at, ends_at, image_url,
                            is_published, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.guid)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.venue)
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(&event.image_url)
    .bind(event.is_published)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn update_event(pool: &SqlitePool, event: &Event) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE events SET title = ?, description = ?, venue = ?, starts_at = ?, ends_at = ?,
                          image_url = ?, is_published = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.venue)
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(&event.image_url)
    .bind(event.is_published)
    .bind(event.updated_at)
    .bind(&event.guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find_event<'e, E>(executor: E, id: &str) -> sqlx::Result<Option<Event>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM events WHERE guid = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Events ordered by start time. `starting_after` keeps only events that
/// have not started yet.
pub async fn list_events(
    pool: &SqlitePool,
    published_only: bool,
    starting_after: Option<DateTime<Utc>>,
) -> sqlx::Result<Vec<Event>> {
    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM events WHERE 1 = 1");
    if published_only {
        query.push(" AND is_published = 1");
    }
    if let Some(after) = starting_after {
        query.push(" AND starts_at >= ").push_bind(after);
    }
    query.push(" ORDER BY starts_at ASC");

    query.build_query_as().fetch_all(pool).await
}

pub async fn delete_event(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM events WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn count_upcoming_events(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE is_published = 1 AND starts_at >= ?")
        .bind(now)
        .fetch_one(pool)
        .await
}

// ============================================================================
// Pricing tiers
// ============================================================================

pub async fn insert_tier<'e, E>(executor: E, tier: &PricingTier) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO pricing_tiers (guid, event_id, name, price_cents, quantity, sold, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tier.guid)
    .bind(&tier.event_id)
    .bind(&tier.name)
    .bind(tier.price_cents)
    .bind(tier.quantity)
    .bind(tier.sold)
    .bind(tier.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_tier<'e, E>(executor: E, id: &str) -> sqlx::Result<Option<PricingTier>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM pricing_tiers WHERE guid = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn update_tier(pool: &SqlitePool, tier: &PricingTier) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "UPDATE pricing_tiers SET name = ?, price_cents = ?, quantity = ? WHERE guid = ?",
    )
    .bind(&tier.name)
    .bind(tier.price_cents)
    .bind(tier.quantity)
    .bind(&tier.guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_tier(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM pricing_tiers WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// `sold += quantity`; the table CHECK rejects overselling
pub async fn increment_sold<'e, E>(executor: E, tier_id: &str, quantity: i64) -> sqlx::Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE pricing_tiers SET sold = sold + ? WHERE guid = ?")
        .bind(quantity)
        .bind(tier_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn tiers_for_event(pool: &SqlitePool, event_id: &str) -> sqlx::Result<Vec<PricingTier>> {
    sqlx::query_as("SELECT * FROM pricing_tiers WHERE event_id = ? ORDER BY price_cents ASC, name ASC")
        .bind(event_id)
        .fetch_all(pool)
        .await
}

/// Load tiers for every event in one query and nest them
pub async fn attach_tiers(pool: &SqlitePool, events: Vec<Event>) -> sqlx::Result<Vec<EventWithTiers>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM pricing_tiers WHERE event_id IN (");
    let mut separated = query.separated(", ");
    for event in &events {
        separated.push_bind(event.guid.clone());
    }
    separated.push_unseparated(") ORDER BY price_cents ASC, name ASC");

    let tiers: Vec<PricingTier> = query.build_query_as().fetch_all(pool).await?;

    let mut by_event: HashMap<String, Vec<TierView>> = HashMap::new();
    for tier in tiers {
        by_event.entry(tier.event_id.clone()).or_default().push(tier.into());
    }

    Ok(events
        .into_iter()
        .map(|event| {
            let pricing_tiers = by_event.remove(&event.guid).unwrap_or_default();
            EventWithTiers { event, pricing_tiers }
        })
        .collect())
}

pub async fn event_with_tiers(pool: &SqlitePool, event: Event) -> sqlx::Result<EventWithTiers> {
    let tiers = tiers_for_event(pool, &event.guid).await?;
    Ok(EventWithTiers {
        event,
        pricing_tiers: tiers.into_iter().map(TierView::from).collect(),
    })
}
