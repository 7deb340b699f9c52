//! Shared harness for club-api integration tests
//!
//! Every test gets an in-memory database, a temporary storage folder, a
//! fake payment gateway and a mailer that records instead of sending.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

use club_api::config::ServerConfig;
use club_api::db::users::ROLE_ADMIN;
use club_api::services::email::{MailError, Mailer, OutgoingEmail};
use club_api::services::payments::{self, CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway};
use club_api::services::pdf::PdfRenderer;
use club_api::services::storage::LocalStorage;
use club_api::{build_router, AppState};

pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Records checkout requests and hands out sequential session ids
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CheckoutSessionRequest>>,
    pub fail: AtomicBool,
    counter: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::Api(500, "provider down".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: format!("cs_test_{}", n),
            url: Some(format!("https://pay.example/cs_test_{}", n)),
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
    _root: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        if self.bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&self.bytes).expect("response is not JSON")
        }
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let root = TempDir::new().unwrap();
        let pool = club_common::db::init_memory_database().await.unwrap();

        let mut config = ServerConfig::local(root.path().to_path_buf());
        config.payments.webhook_secret = Some(WEBHOOK_SECRET.to_string());
        // Nothing listens here; scrapes fail fast
        config.scraper.base_url = "http://127.0.0.1:9".to_string();

        let gateway = Arc::new(FakeGateway::default());
        let mailer = Arc::new(RecordingMailer::default());
        let storage = Arc::new(LocalStorage::new(root.path().join("storage")));

        let state = AppState::new(
            pool,
            config,
            gateway.clone(),
            mailer.clone(),
            storage,
            PdfRenderer::fallback_only(),
        );
        let router = build_router(state.clone());

        Self {
            router,
            state,
            gateway,
            mailer,
            _root: root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        TestResponse { status, headers, bytes }
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let response = self.request(Method::GET, path, token, None).await;
        (response.status, response.json())
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let response = self.request(Method::POST, path, token, Some(body)).await;
        (response.status, response.json())
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let response = self.request(Method::PUT, path, token, Some(body)).await;
        (response.status, response.json())
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let response = self.request(Method::DELETE, path, token, None).await;
        (response.status, response.json())
    }

    /// Register a member and return (token, user id)
    pub async fn register(&self, email: &str, name: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "email": email, "password": "correct horse", "full_name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Register a user and promote it to admin
    pub async fn admin(&self) -> String {
        let (token, user_id) = self.register("admin@club.test", "Club Admin").await;
        club_api::db::users::set_role(&self.state.db, &user_id, ROLE_ADMIN, Utc::now())
            .await
            .unwrap();
        token
    }

    /// Published event a week ahead with one tier; returns (event id, tier id)
    pub async fn event_with_tier(&self, admin: &str, price_cents: i64, quantity: i64) -> (String, String) {
        let starts_at = (Utc::now() + Duration::days(7)).to_rfc3339();
        let (status, body) = self
            .post(
                "/api/admin/events",
                Some(admin),
                json!({
                    "title": "Home match vs FK Sūduva",
                    "venue": "LFF stadionas",
                    "starts_at": starts_at,
                    "tiers": [{ "name": "Standard", "price_cents": price_cents, "quantity": quantity }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "event create failed: {}", body);
        (
            body["id"].as_str().unwrap().to_string(),
            body["pricing_tiers"][0]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Deliver a signed webhook for a checkout session
    pub async fn webhook(&self, event_type: &str, session_id: &str, order_id: &str) -> TestResponse {
        let payload = json!({
            "id": "evt_test",
            "type": event_type,
            "data": { "object": {
                "id": session_id,
                "client_reference_id": order_id,
                "metadata": { "order_id": order_id }
            }}
        })
        .to_string();
        let signature = payments::sign_payload(payload.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/payments")
            .header(header::CONTENT_TYPE, "application/json")
            .header("stripe-signature", signature)
            .body(Body::from(payload))
            .unwrap();
        self.send(request).await
    }

    pub fn sent_subjects(&self) -> Vec<String> {
        self.mailer.sent.lock().unwrap().iter().map(|m| m.subject.clone()).collect()
    }
}
