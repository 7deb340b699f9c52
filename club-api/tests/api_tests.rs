//! API contract tests: auth, catalogue, content and admin endpoints

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "club-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_register_login_and_logout() {
    let app = TestApp::spawn().await;
    let (token, user_id) = app.register("Fan@Example.com", "Jonas Fan").await;

    let (status, me) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id.as_str());
    assert_eq!(me["email"], "fan@example.com");
    assert_eq!(me["role"], "member");
    assert!(me.get("password_hash").is_none());

    let stored = club_api::db::users::find_user_by_email(&app.state.db, "fan@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.password_hash.starts_with("$argon2id$"), "{}", stored.password_hash);

    // Same address in another case is a duplicate
    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "FAN@example.com", "password": "another password" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .post("/api/auth/login", None, json!({ "email": "fan@example.com", "password": "wrong password" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = app
        .post("/api/auth/login", None, json!({ "email": "fan@example.com", "password": "correct horse" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let second = login["token"].as_str().unwrap().to_string();
    assert_ne!(second, token);

    let (status, _) = app.post("/api/auth/logout", Some(&second), json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/api/auth/me", Some(&second)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The first session is unaffected
    let (status, _) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_rejects_short_password_and_bad_email() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .post("/api/auth/register", None, json!({ "email": "a@b.lt", "password": "short" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/auth/register", None, json!({ "email": "not-an-email", "password": "long enough" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::spawn().await;
    let (member, _) = app.register("member@club.test", "Member").await;

    let (status, body) = app.get("/api/admin/dashboard", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.get("/api/admin/dashboard", Some("not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/admin/dashboard", Some(&member)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.admin().await;
    let (status, _) = app.get("/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_events_list_with_nested_tiers() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (event_id, _) = app.event_with_tier(&admin, 1500, 100).await;

    let (status, _) = app
        .post(
            &format!("/api/admin/events/{}/tiers", event_id),
            Some(&admin),
            json!({ "name": "VIP", "price_cents": 4500, "quantity": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Drafts stay off the public list
    let (status, _) = app
        .post(
            "/api/admin/events",
            Some(&admin),
            json!({
                "title": "Closed training",
                "starts_at": (Utc::now() + Duration::days(3)).to_rfc3339(),
                "is_published": false
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, events) = app.get("/api/events", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], event_id.as_str());

    let tiers = events[0]["pricing_tiers"].as_array().unwrap();
    assert_eq!(tiers.len(), 2);
    assert!(tiers.iter().any(|t| t["name"] == "VIP" && t["remaining"] == 10));
    assert!(tiers.iter().any(|t| t["name"] == "Standard" && t["price_cents"] == 1500));

    let (status, all) = app.get("/api/admin/events", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_event_validation() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let (status, body) = app
        .post("/api/admin/events", Some(&admin), json!({ "starts_at": "2030-01-01T18:00:00Z" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("title"));

    let (status, _) = app
        .post(
            "/api/admin/events",
            Some(&admin),
            json!({ "title": "Derby", "starts_at": "2030-01-01T18:00:00Z", "ends_at": "2029-12-31T18:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/events/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/api/events/{}", club_common::ids::generate()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_coupon_duplicate_code_returns_400() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let coupon = json!({ "code": "summer10", "discount_type": "percent", "discount_value": 10 });
    let (status, created) = app.post("/api/admin/coupons", Some(&admin), coupon).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["code"], "SUMMER10");

    let (status, body) = app
        .post(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "Summer10", "discount_type": "fixed", "discount_value": 500 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["code"], "SUMMER10");
}

#[tokio::test]
async fn test_coupon_validation_rules() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let (status, _) = app
        .post(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "TEN", "discount_type": "percent", "discount_value": 10, "min_order_cents": 2000 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/api/coupons/validate", None, json!({ "code": "ten", "subtotal_cents": 2999 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["discount_cents"], 299);
    assert_eq!(body["total_cents"], 2700);

    let (status, body) = app
        .post("/api/coupons/validate", None, json!({ "code": "ten", "subtotal_cents": i64::MAX }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discount_cents"], i64::MAX / 10);
    assert_eq!(body["total_cents"], i64::MAX - i64::MAX / 10);

    let (status, _) = app
        .post("/api/coupons/validate", None, json!({ "code": "TEN", "subtotal_cents": 1000 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/coupons/validate", None, json!({ "code": "NOPE", "subtotal_cents": 5000 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "HALFPLUS", "discount_type": "percent", "discount_value": 150 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shop_hides_inactive_products() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let (status, scarf) = app
        .post(
            "/api/admin/products",
            Some(&admin),
            json!({ "name": "Club scarf", "price_cents": 1999, "stock": 40 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let scarf_id = scarf["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            "/api/admin/products",
            Some(&admin),
            json!({ "name": "Old kit", "price_cents": 2500, "stock": 2, "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, products) = app.get("/api/products", None).await;
    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["id"], scarf_id.as_str());

    let (status, _) = app
        .post("/api/admin/products", Some(&admin), json!({ "name": "Broken", "price_cents": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_posts_pagination_and_slugs() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    for i in 1..=12 {
        let (status, _) = app
            .post(
                "/api/admin/posts",
                Some(&admin),
                json!({ "title": format!("Match report {}", i), "body": "Full time.", "is_published": true }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, draft) = app
        .post("/api/admin/posts", Some(&admin), json!({ "title": "Transfer news", "body": "Soon." }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(draft["slug"], "transfer-news");
    assert!(draft["published_at"].is_null());

    let (status, page1) = app.get("/api/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page1["total_results"], 12);
    assert_eq!(page1["total_pages"], 2);
    assert_eq!(page1["data"].as_array().unwrap().len(), 10);

    let (_, page2) = app.get("/api/posts?page=2", None).await;
    assert_eq!(page2["page"], 2);
    assert_eq!(page2["data"].as_array().unwrap().len(), 2);

    let (status, _) = app.get("/api/posts/transfer-news", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/api/admin/posts", Some(&admin), json!({ "title": "Transfer News!", "body": "Again" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["slug"], "transfer-news");

    let draft_id = draft["id"].as_str().unwrap();
    let (status, published) = app
        .put(&format!("/api/admin/posts/{}", draft_id), Some(&admin), json!({ "is_published": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let first_published_at = published["published_at"].clone();
    assert!(first_published_at.is_string());

    // Re-publishing keeps the original date
    app.put(&format!("/api/admin/posts/{}", draft_id), Some(&admin), json!({ "is_published": false }))
        .await;
    let (_, republished) = app
        .put(&format!("/api/admin/posts/{}", draft_id), Some(&admin), json!({ "is_published": true }))
        .await;
    assert_eq!(republished["published_at"], first_published_at);

    let (status, post) = app.get("/api/posts/transfer-news", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["title"], "Transfer news");
}

#[tokio::test]
async fn test_teams_and_players() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let (status, team) = app
        .post("/api/admin/teams", Some(&admin), json!({ "name": "First team", "is_club_team": true }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let team_id = team["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post("/api/admin/teams", Some(&admin), json!({ "name": "first TEAM" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (first, last, number) in [("Ona", "Keeper", Some(1)), ("Tomas", "Sub", None), ("Rokas", "Nine", Some(9))] {
        let (status, _) = app
            .post(
                "/api/admin/players",
                Some(&admin),
                json!({ "team_id": team_id, "first_name": first, "last_name": last, "shirt_number": number }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, squad) = app.get(&format!("/api/teams/{}", team_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = squad["players"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["last_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Keeper", "Nine", "Sub"]);

    let (status, _) = app
        .post(
            "/api/admin/players",
            Some(&admin),
            json!({ "team_id": club_common::ids::generate(), "first_name": "No", "last_name": "Team" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let player_id = squad["players"][0]["id"].as_str().unwrap().to_string();
    let (status, updated) = app
        .put(&format!("/api/admin/players/{}", player_id), Some(&admin), json!({ "shirt_number": 12 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["shirt_number"], 12);

    let (status, _) = app.delete(&format!("/api/admin/players/{}", player_id), Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, players) = app.get(&format!("/api/players?team_id={}", team_id), None).await;
    assert_eq!(players.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_contact_form_forwards_to_inbox() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .post(
            "/api/contact",
            None,
            json!({ "name": "Rūta", "email": "ruta@example.com", "message": "<b>Tickets</b> for groups?" }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let sent = app.mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, app.state.config.email.club_inbox);
    assert_eq!(sent[0].reply_to.as_deref(), Some("ruta@example.com"));
    assert!(!sent[0].html.contains("<b>Tickets</b>"));

    let (status, _) = app
        .post("/api/contact", None, json!({ "name": "Rūta", "email": "ruta@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_role_management() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, member_id) = app.register("coach@club.test", "Coach").await;

    let (status, users) = app.get("/api/admin/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (status, promoted) = app
        .post(&format!("/api/admin/users/{}/role", member_id), Some(&admin), json!({ "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "admin");

    let (status, _) = app
        .post(&format!("/api/admin/users/{}/role", member_id), Some(&admin), json!({ "role": "owner" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, me) = app.get("/api/auth/me", Some(&admin)).await;
    let (status, _) = app
        .post(
            &format!("/api/admin/users/{}/role", me["id"].as_str().unwrap()),
            Some(&admin),
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_counts() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    app.event_with_tier(&admin, 1000, 50).await;
    app.post(
        "/api/admin/products",
        Some(&admin),
        json!({ "name": "Pin badge", "price_cents": 300, "stock": 3 }),
    )
    .await;

    let (status, dashboard) = app.get("/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["users"], 1);
    assert_eq!(dashboard["upcoming_events"], 1);
    assert_eq!(dashboard["tickets_sold"], 0);
    assert_eq!(dashboard["low_stock_products"], 1);
    assert_eq!(dashboard["revenue_cents"], 0);
    assert!(dashboard["last_scrape_at"].is_null());
    assert!(dashboard["recent_orders"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_scrape_reports_unreachable_site() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let (status, report) = app.post("/api/admin/scrape", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["fixtures_upserted"], 0);
    assert_eq!(report["standings_upserted"], 0);
    assert_eq!(report["errors"].as_array().unwrap().len(), 2);
    assert!(report["last_scrape_at"].is_null());
}

#[tokio::test]
async fn test_fixtures_filter_rejects_unknown_status() {
    let app = TestApp::spawn().await;

    let (status, fixtures) = app.get("/api/fixtures", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(fixtures.as_array().unwrap().is_empty());

    let (status, _) = app.get("/api/fixtures?status=live", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
