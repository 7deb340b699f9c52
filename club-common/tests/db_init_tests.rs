//! Tests for database initialization
//!
//! - Database file is created on first run
//! - Re-opening an existing database is a no-op for the schema
//! - Constraints declared in the schema are enforced

use club_common::db::{get_setting, init_database, init_memory_database, set_setting};
use tempfile::TempDir;

const TABLES: &[&str] = &[
    "settings",
    "users",
    "sessions",
    "events",
    "pricing_tiers",
    "products",
    "subscription_plans",
    "coupons",
    "orders",
    "order_items",
    "tickets",
    "subscriptions",
    "posts",
    "teams",
    "players",
    "fixtures",
    "standings",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("club.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("club.db");

    let pool1 = init_database(&db_path).await.unwrap();
    set_setting(&pool1, "marker", "kept").await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let marker = get_setting(&pool2.unwrap(), "marker").await.unwrap();
    assert_eq!(marker.as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    for table in TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_coupon_code_unique_case_insensitive() {
    let pool = init_memory_database().await.unwrap();
    let insert = "INSERT INTO coupons (guid, code, discount_type, discount_value, created_at)
                  VALUES (?, ?, 'percent', 10, '2026-01-01T00:00:00+00:00')";

    sqlx::query(insert).bind("a").bind("SUMMER").execute(&pool).await.unwrap();
    let dup = sqlx::query(insert).bind("b").bind("summer").execute(&pool).await;

    assert!(dup.is_err(), "duplicate code with different case must be rejected");
}

#[tokio::test]
async fn test_tier_cannot_oversell() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query(
        "INSERT INTO events (guid, title, starts_at, created_at, updated_at)
         VALUES ('e1', 'Derby', '2030-01-01T18:00:00+00:00', 'now', 'now')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO pricing_tiers (guid, event_id, name, price_cents, quantity, created_at)
         VALUES ('t1', 'e1', 'Standard', 1000, 2, 'now')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let ok = sqlx::query("UPDATE pricing_tiers SET sold = sold + 2 WHERE guid = 't1'")
        .execute(&pool)
        .await;
    assert!(ok.is_ok());

    let oversell = sqlx::query("UPDATE pricing_tiers SET sold = sold + 1 WHERE guid = 't1'")
        .execute(&pool)
        .await;
    assert!(oversell.is_err(), "sold must never exceed quantity");
}

#[tokio::test]
async fn test_settings_roundtrip_and_overwrite() {
    let pool = init_memory_database().await.unwrap();

    assert_eq!(get_setting(&pool, "last_scrape_at").await.unwrap(), None);

    set_setting(&pool, "last_scrape_at", "first").await.unwrap();
    set_setting(&pool, "last_scrape_at", "second").await.unwrap();

    assert_eq!(
        get_setting(&pool, "last_scrape_at").await.unwrap().as_deref(),
        Some("second")
    );
}
