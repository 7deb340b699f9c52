//! Checkout, payment webhooks, fulfillment and ticket scanning

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

use common::TestApp;

async fn buy_tickets(app: &TestApp, token: Option<&str>, tier_id: &str, quantity: i64) -> (StatusCode, Value) {
    app.post(
        "/api/checkout",
        token,
        json!({
            "customer_email": "buyer@example.com",
            "customer_name": "Buyer",
            "items": [{ "type": "ticket", "tier_id": tier_id, "quantity": quantity }]
        }),
    )
    .await
}

#[tokio::test]
async fn test_checkout_creates_pending_order_with_session() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, tier_id) = app.event_with_tier(&admin, 1500, 100).await;
    let (member, _) = app.register("buyer@example.com", "Buyer").await;

    let (status, body) = buy_tickets(&app, Some(&member), &tier_id, 2).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["session_id"], "cs_test_1");
    assert_eq!(body["checkout_url"], "https://pay.example/cs_test_1");
    assert_eq!(body["subtotal_cents"], 3000);
    assert_eq!(body["total_cents"], 3000);

    let requests = app.gateway.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].total_cents, 3000);
    assert_eq!(requests[0].line_items[0].quantity, 2);
    assert_eq!(requests[0].customer_email, "buyer@example.com");

    let (status, orders) = app.get("/api/orders", Some(&member)).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_rejects_bad_carts() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, tier_id) = app.event_with_tier(&admin, 1500, 2).await;

    let (status, _) = app
        .post("/api/checkout", None, json!({ "customer_email": "x@example.com", "items": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/checkout",
            None,
            json!({ "items": [{ "type": "ticket", "tier_id": tier_id, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = buy_tickets(&app, None, &tier_id, 3).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["remaining"], 2);

    // Two lines for the same tier count together
    let (status, _) = app
        .post(
            "/api/checkout",
            None,
            json!({
                "customer_email": "x@example.com",
                "items": [
                    { "type": "ticket", "tier_id": tier_id, "quantity": 2 },
                    { "type": "ticket", "tier_id": tier_id, "quantity": 1 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = buy_tickets(&app, None, &tier_id, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = buy_tickets(&app, None, &tier_id, 1001).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A huge second line must not wrap the running total
    let (status, _) = app
        .post(
            "/api/checkout",
            None,
            json!({
                "customer_email": "x@example.com",
                "items": [
                    { "type": "ticket", "tier_id": tier_id, "quantity": 1 },
                    { "type": "ticket", "tier_id": tier_id, "quantity": i64::MAX }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.gateway.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_fulfills_order_exactly_once() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (event_id, tier_id) = app.event_with_tier(&admin, 1500, 100).await;
    let (member, _) = app.register("buyer@example.com", "Buyer").await;

    let (_, order) = buy_tickets(&app, Some(&member), &tier_id, 2).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let response = app.webhook("checkout.session.completed", "cs_test_1", &order_id).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["received"], true);
    assert_eq!(body["handled"], true);

    let (_, tickets) = app.get("/api/tickets", Some(&member)).await;
    assert_eq!(tickets.as_array().unwrap().len(), 2);
    assert_eq!(tickets[0]["status"], "valid");
    assert!(tickets[0]["qr_token"].as_str().unwrap().starts_with("TKT-"));

    let (_, event) = app.get(&format!("/api/events/{}", event_id), None).await;
    assert_eq!(event["pricing_tiers"][0]["sold"], 2);
    assert_eq!(event["pricing_tiers"][0]["remaining"], 98);

    assert_eq!(app.sent_subjects(), vec!["Your order confirmation".to_string()]);

    // Redelivery changes nothing
    let response = app.webhook("checkout.session.completed", "cs_test_1", &order_id).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["handled"], false);

    let (_, tickets) = app.get("/api/tickets", Some(&member)).await;
    assert_eq!(tickets.as_array().unwrap().len(), 2);
    assert_eq!(app.sent_subjects().len(), 1);

    let (_, order) = app.get(&format!("/api/orders/{}", order_id), Some(&member)).await;
    assert_eq!(order["status"], "paid");
    assert!(order["paid_at"].is_string());

    let (_, dashboard) = app.get("/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(dashboard["tickets_sold"], 2);
    assert_eq!(dashboard["paid_orders"], 1);
    assert_eq!(dashboard["revenue_cents"], 3000);

    // Sold tickets pin the tier
    let tier_path = format!("/api/admin/tiers/{}", tier_id);
    let (status, body) = app.put(&tier_path, Some(&admin), json!({ "quantity": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["sold"], 2);

    let (status, _) = app.put(&tier_path, Some(&admin), json!({ "quantity": 2 })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.delete(&tier_path, Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_tier_with_unpaid_order_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (event_id, tier_id) = app.event_with_tier(&admin, 1500, 10).await;

    let (_, order) = buy_tickets(&app, None, &tier_id, 2).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let tier_path = format!("/api/admin/tiers/{}", tier_id);
    let (status, body) = app.delete(&tier_path, Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["pending_tickets"], 2);

    let (status, _) = app.delete(&format!("/api/admin/events/{}", event_id), Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Payment still goes through
    let response = app.webhook("checkout.session.completed", "cs_test_1", &order_id).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["handled"], true);

    // An abandoned cart stops blocking once its session expires
    let (_, tier_two) = app
        .post(
            &format!("/api/admin/events/{}/tiers", event_id),
            Some(&admin),
            json!({ "name": "VIP", "price_cents": 5000, "quantity": 5 }),
        )
        .await;
    let tier_two_id = tier_two["id"].as_str().unwrap().to_string();
    let (_, abandoned) = buy_tickets(&app, None, &tier_two_id, 1).await;
    let abandoned_id = abandoned["order_id"].as_str().unwrap().to_string();

    let tier_two_path = format!("/api/admin/tiers/{}", tier_two_id);
    let (status, _) = app.delete(&tier_two_path, Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.webhook("checkout.session.expired", "cs_test_2", &abandoned_id).await;
    let (status, _) = app.delete(&tier_two_path, Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_coupon_usage_never_exceeds_limit() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, tier_id) = app.event_with_tier(&admin, 2000, 10).await;

    let (status, coupon) = app
        .post(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "ONCE", "discount_type": "percent", "discount_value": 10, "max_uses": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Both carts validate while the coupon is still unused
    let mut order_ids = Vec::new();
    for email in ["first@example.com", "second@example.com"] {
        let (status, order) = app
            .post(
                "/api/checkout",
                None,
                json!({
                    "customer_email": email,
                    "items": [{ "type": "ticket", "tier_id": tier_id }],
                    "coupon_code": "ONCE"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", order);
        assert_eq!(order["total_cents"], 1800);
        order_ids.push(order["order_id"].as_str().unwrap().to_string());
    }

    for (n, order_id) in order_ids.iter().enumerate() {
        let response = app
            .webhook("checkout.session.completed", &format!("cs_test_{}", n + 1), order_id)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["handled"], true);
    }

    let (_, coupons) = app.get("/api/admin/coupons", Some(&admin)).await;
    let stored = coupons
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == coupon["id"])
        .unwrap()
        .clone();
    assert_eq!(stored["used_count"], 1);
    assert_eq!(stored["max_uses"], 1);
}

#[tokio::test]
async fn test_webhook_signature_is_required() {
    let app = TestApp::spawn().await;

    let payload = json!({ "type": "checkout.session.completed", "data": { "object": { "id": "cs_x" } } }).to_string();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/payments")
        .header("stripe-signature", "t=1,v1=deadbeef")
        .body(Body::from(payload.clone()))
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::BAD_REQUEST);

    for signature in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/payments")
            .header("stripe-signature", signature)
            .body(Body::from(payload.clone()))
            .unwrap();
        assert_eq!(app.send(request).await.status, StatusCode::BAD_REQUEST);
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/payments")
        .body(Body::from(payload))
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_session_cancels_pending_order() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, tier_id) = app.event_with_tier(&admin, 1500, 10).await;

    let (_, order) = buy_tickets(&app, None, &tier_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let response = app.webhook("checkout.session.expired", "cs_test_1", &order_id).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["handled"], true);

    // A late completion no longer fulfills
    let response = app.webhook("checkout.session.completed", "cs_test_1", &order_id).await;
    assert_eq!(response.json()["handled"], false);

    let (_, orders) = app.get("/api/admin/orders?status=cancelled", Some(&admin)).await;
    assert_eq!(orders["total_results"], 1);
    assert_eq!(orders["data"][0]["id"], order_id.as_str());
}

#[tokio::test]
async fn test_gateway_failure_cancels_order() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, tier_id) = app.event_with_tier(&admin, 1500, 10).await;
    app.gateway.fail.store(true, Ordering::SeqCst);

    let (status, body) = buy_tickets(&app, None, &tier_id, 1).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());

    let (_, orders) = app.get("/api/admin/orders?status=cancelled", Some(&admin)).await;
    assert_eq!(orders["total_results"], 1);
    let (_, pending) = app.get("/api/admin/orders?status=pending", Some(&admin)).await;
    assert_eq!(pending["total_results"], 0);
}

#[tokio::test]
async fn test_fully_discounted_order_is_paid_immediately() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, tier_id) = app.event_with_tier(&admin, 1500, 10).await;

    let (status, coupon) = app
        .post(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "GUEST", "discount_type": "fixed", "discount_value": 5000, "max_uses": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let cart = json!({
        "customer_email": "guest@example.com",
        "items": [{ "type": "ticket", "tier_id": tier_id }],
        "coupon_code": "guest"
    });
    let (status, body) = app.post("/api/checkout", None, cart.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["discount_cents"], 1500);
    assert_eq!(body["total_cents"], 0);
    assert!(body["session_id"].is_null());
    assert!(app.gateway.requests.lock().unwrap().is_empty());

    let (_, coupons) = app.get("/api/admin/coupons", Some(&admin)).await;
    let used = coupons
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == coupon["id"])
        .unwrap()["used_count"]
        .clone();
    assert_eq!(used, 1);

    // Usage limit reached
    let (status, _) = app.post("/api/checkout", None, cart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ticket_documents_and_scanning() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (event_id, tier_id) = app.event_with_tier(&admin, 1500, 10).await;
    let (member, _) = app.register("buyer@example.com", "Buyer").await;
    let (stranger, _) = app.register("other@example.com", "Other").await;

    let (_, order) = buy_tickets(&app, Some(&member), &tier_id, 1).await;
    let order_id = order["order_id"].as_str().unwrap().to_string();
    app.webhook("checkout.session.completed", "cs_test_1", &order_id).await;

    let (_, tickets) = app.get("/api/tickets", Some(&member)).await;
    let ticket_id = tickets[0]["id"].as_str().unwrap().to_string();
    let qr_token = tickets[0]["qr_token"].as_str().unwrap().to_string();

    let pdf = app
        .request(Method::GET, &format!("/api/tickets/{}/pdf", ticket_id), Some(&member), None)
        .await;
    assert_eq!(pdf.status, StatusCode::OK);
    assert_eq!(pdf.headers[header::CONTENT_TYPE], "application/pdf");
    assert!(pdf.bytes.starts_with(b"%PDF"));

    let png = app
        .request(Method::GET, &format!("/api/tickets/{}/qr", ticket_id), Some(&member), None)
        .await;
    assert_eq!(png.status, StatusCode::OK);
    assert_eq!(png.headers[header::CONTENT_TYPE], "image/png");
    assert!(png.bytes.starts_with(&[0x89, b'P', b'N', b'G']));

    let denied = app
        .request(Method::GET, &format!("/api/tickets/{}/pdf", ticket_id), Some(&stranger), None)
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let (_, event_tickets) = app.get(&format!("/api/admin/events/{}/tickets", event_id), Some(&admin)).await;
    assert_eq!(event_tickets.as_array().unwrap().len(), 1);

    // Event with sold tickets cannot be deleted
    let (status, body) = app.delete(&format!("/api/admin/events/{}", event_id), Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let scan = json!({ "qr": format!("club:ticket:{}", qr_token) });
    let (status, admitted) = app.post("/api/admin/tickets/verify", Some(&admin), scan.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admitted["status"], "used");
    assert!(admitted["used_at"].is_string());

    let (status, again) = app.post("/api/admin/tickets/verify", Some(&admin), scan).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["details"]["used_at"], admitted["used_at"]);

    let (status, _) = app
        .post("/api/admin/tickets/verify", Some(&admin), json!({ "qr": "garbage" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/admin/tickets/verify", Some(&member), json!({ "qr": qr_token }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_product_purchase_decrements_stock() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, scarf) = app
        .post(
            "/api/admin/products",
            Some(&admin),
            json!({ "name": "Club scarf", "price_cents": 1999, "stock": 5 }),
        )
        .await;
    let scarf_id = scarf["id"].as_str().unwrap().to_string();

    let (status, order) = app
        .post(
            "/api/checkout",
            None,
            json!({
                "customer_email": "fan@example.com",
                "items": [{ "type": "product", "product_id": scarf_id, "quantity": 2 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["order_id"].as_str().unwrap().to_string();
    app.webhook("checkout.session.completed", "cs_test_1", &order_id).await;

    let (_, product) = app.get(&format!("/api/products/{}", scarf_id), None).await;
    assert_eq!(product["stock"], 3);
}

#[tokio::test]
async fn test_membership_purchase_and_card() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (member, _) = app.register("member@example.com", "Member").await;
    let (stranger, _) = app.register("other@example.com", "Other").await;

    let (status, plan) = app
        .post(
            "/api/admin/subscription-plans",
            Some(&admin),
            json!({ "name": "Season 2026", "price_cents": 9000, "duration_days": 365 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let plan_id = plan["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            "/api/admin/subscription-plans",
            Some(&admin),
            json!({ "name": "Broken", "price_cents": 100, "duration_days": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/admin/subscription-plans",
            Some(&admin),
            json!({ "name": "Forever", "price_cents": 100, "duration_days": 9_000_000_000_000i64 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["duration_days"], 9_000_000_000_000i64);

    let cart = json!({
        "customer_email": "member@example.com",
        "items": [{ "type": "subscription", "plan_id": plan_id }]
    });
    let (status, _) = app.post("/api/checkout", None, cart.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, order) = app.post("/api/checkout", Some(&member), cart).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["order_id"].as_str().unwrap().to_string();
    app.webhook("checkout.session.completed", "cs_test_1", &order_id).await;

    let (_, subscriptions) = app.get("/api/subscriptions", Some(&member)).await;
    let subscriptions = subscriptions.as_array().unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["status"], "active");
    assert_eq!(subscriptions[0]["plan_name"], "Season 2026");
    let subscription_id = subscriptions[0]["id"].as_str().unwrap().to_string();

    let card = app
        .request(Method::GET, &format!("/api/subscriptions/{}/card", subscription_id), Some(&member), None)
        .await;
    assert_eq!(card.status, StatusCode::OK);
    assert!(card.bytes.starts_with(b"%PDF"));

    let denied = app
        .request(Method::GET, &format!("/api/subscriptions/{}/card", subscription_id), Some(&stranger), None)
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let subjects = app.sent_subjects();
    assert!(subjects.contains(&"Your order confirmation".to_string()));
    assert!(subjects.contains(&"Welcome: Season 2026".to_string()));

    let (status, expired) = app.post("/api/admin/subscriptions/expire", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(expired["expired"], 0);

    let (_, dashboard) = app.get("/api/admin/dashboard", Some(&admin)).await;
    assert_eq!(dashboard["active_subscriptions"], 1);
}
