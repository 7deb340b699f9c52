//! Admin dashboard figures

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use super::{events, orders, posts, products, subscriptions, tickets, users};

/// Products at or below this stock level are flagged
pub const LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub users: i64,
    pub upcoming_events: i64,
    pub tickets_sold: i64,
    pub paid_orders: i64,
    pub revenue_cents: i64,
    pub active_subscriptions: i64,
    pub low_stock_products: i64,
    pub published_posts: i64,
    pub last_scrape_at: Option<String>,
    pub recent_orders: Vec<orders::Order>,
}

/// Run the independent counts concurrently
pub async fn load_dashboard(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<Dashboard> {
    let (
        users,
        upcoming_events,
        tickets_sold,
        paid_orders,
        revenue_cents,
        active_subscriptions,
        low_stock_products,
        published_posts,
        recent_orders,
    ) = tokio::try_join!(
        users::count_users(pool),
        events::count_upcoming_events(pool, now),
        tickets::count_sold_tickets(pool),
        orders::count_orders(pool, Some(orders::STATUS_PAID)),
        orders::paid_revenue_cents(pool),
        subscriptions::count_active(pool, now),
        products::count_low_stock(pool, LOW_STOCK_THRESHOLD),
        posts::count_published(pool),
        orders::recent_orders(pool, 5),
    )?;

    Ok(Dashboard {
        users,
        upcoming_events,
        tickets_sold,
        paid_orders,
        revenue_cents,
        active_subscriptions,
        low_stock_products,
        published_posts,
        last_scrape_at: None,
        recent_orders,
    })
}
