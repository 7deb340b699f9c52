//! Database access for club-api
//!
//! One module per entity. Handlers and services never write SQL directly.

pub mod coupons;
pub mod dashboard;
pub mod events;
pub mod fixtures;
pub mod orders;
pub mod posts;
pub mod products;
pub mod sessions;
pub mod subscriptions;
pub mod teams;
pub mod tickets;
pub mod users;

/// Settings key holding the time of the last successful scrape
pub const LAST_SCRAPE_SETTING: &str = "last_scrape_at";
