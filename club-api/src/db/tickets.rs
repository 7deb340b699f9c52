//! Issued tickets

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};

pub const STATUS_VALID: &str = "valid";
pub const STATUS_USED: &str = "used";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    #[serde(rename = "id")]
    pub guid: String,
    pub order_id: String,
    pub event_id: String,
    pub tier_id: String,
    pub user_id: Option<String>,
    pub holder_name: Option<String>,
    pub holder_email: String,
    pub qr_token: String,
    #[serde(skip)]
    pub pdf_path: Option<String>,
    pub status: String,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Ticket joined with its event and tier
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub ticket: Ticket,
    pub event_title: String,
    pub event_starts_at: DateTime<Utc>,
    pub event_venue: Option<String>,
    pub tier_name: String,
}

const DETAILS_SELECT: &str = r#"
    SELECT t.*, e.title AS event_title, e.starts_at AS event_starts_at, e.venue AS event_venue,
           p.name AS tier_name
    FROM tickets t
    JOIN events e ON e.guid = t.event_id
    JOIN pricing_tiers p ON p.guid = t.tier_id
"#;

pub async fn insert_ticket<'e, E>(executor: E, ticket: &Ticket) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO tickets (guid, order_id, event_id, tier_id, user_id, holder_name, holder_email,
                             qr_token, pdf_path, status, used_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&ticket.guid)
    .bind(&ticket.order_id)
    .bind(&ticket.event_id)
    .bind(&ticket.tier_id)
    .bind(&ticket.user_id)
    .bind(&ticket.holder_name)
    .bind(&ticket.holder_email)
    .bind(&ticket.qr_token)
    .bind(&ticket.pdf_path)
    .bind(&ticket.status)
    .bind(ticket.used_at)
    .bind(ticket.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_ticket_details(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<TicketDetails>> {
    sqlx::query_as(&format!("{} WHERE t.guid = ?", DETAILS_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_ticket_by_token(pool: &SqlitePool, token: &str) -> sqlx::Result<Option<TicketDetails>> {
    sqlx::query_as(&format!("{} WHERE t.qr_token = ?", DETAILS_SELECT))
        .bind(token)
        .fetch_optional(pool)
        .await
}

pub async fn list_tickets_for_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<TicketDetails>> {
    sqlx::query_as(&format!("{} WHERE t.user_id = ? ORDER BY e.starts_at ASC", DETAILS_SELECT))
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn list_tickets_for_event(pool: &SqlitePool, event_id: &str) -> sqlx::Result<Vec<TicketDetails>> {
    sqlx::query_as(&format!("{} WHERE t.event_id = ? ORDER BY t.created_at ASC", DETAILS_SELECT))
        .bind(event_id)
        .fetch_all(pool)
        .await
}

pub async fn list_tickets_for_order(pool: &SqlitePool, order_id: &str) -> sqlx::Result<Vec<TicketDetails>> {
    sqlx::query_as(&format!("{} WHERE t.order_id = ? ORDER BY t.created_at ASC", DETAILS_SELECT))
        .bind(order_id)
        .fetch_all(pool)
        .await
}

/// valid → used. Returns 0 when the ticket was not valid any more.
pub async fn mark_used(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> sqlx::Result<u64> {
    let result = sqlx::query("UPDATE tickets SET status = 'used', used_at = ? WHERE guid = ? AND status = 'valid'")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn set_pdf_path(pool: &SqlitePool, id: &str, path: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE tickets SET pdf_path = ? WHERE guid = ?")
        .bind(path)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn count_tickets_for_event(pool: &SqlitePool, event_id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE event_id = ?")
        .bind(event_id)
        .fetch_one(pool)
        .await
}

pub async fn count_sold_tickets(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE status != 'cancelled'")
        .fetch_one(pool)
        .await
}
