//! Payment provider integration
//!
//! Hosted checkout sessions are created through the `PaymentGateway` trait.
//! `StripeGateway` speaks the Stripe REST API (form-encoded requests, bearer
//! secret key). Webhook payloads are authenticated with the
//! `Stripe-Signature` header before anything in them is trusted.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::PaymentsConfig;
use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider is not configured")]
    NotConfigured,

    #[error("Payment request failed: {0}")]
    Network(String),

    #[error("Payment API error {0}: {1}")]
    Api(u16, String),

    #[error("Unexpected payment response: {0}")]
    Parse(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature(msg) => {
                ApiError::bad_request(format!("Invalid webhook signature: {}", msg))
            }
            PaymentError::Parse(msg) => ApiError::bad_request(format!("Invalid payload: {}", msg)),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: String,
    pub customer_email: String,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

/// Build the gateway for this configuration
pub fn from_config(config: &PaymentsConfig) -> Result<Box<dyn PaymentGateway>, PaymentError> {
    Ok(Box::new(StripeGateway::new(
        config.api_base_url.clone(),
        config.secret_key.clone(),
    )?))
}

pub struct StripeGateway {
    http_client: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
}

impl StripeGateway {
    pub fn new(base_url: String, secret_key: Option<String>) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            secret_key,
        })
    }
}

/// Form fields for `POST /v1/checkout/sessions`
///
/// The provider cannot apply our own coupons, so a discounted cart is sent
/// as a single line carrying the discounted total.
pub fn checkout_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("customer_email".to_string(), request.customer_email.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), request.order_id.clone()),
        ("metadata[order_id]".to_string(), request.order_id.clone()),
    ];

    let collapsed;
    let items: &[LineItem] = if request.discount_cents > 0 {
        let names: Vec<&str> = request.line_items.iter().map(|i| i.name.as_str()).collect();
        collapsed = [LineItem {
            name: format!("Order: {}", names.join(", ")),
            unit_amount_cents: request.total_cents,
            quantity: 1,
        }];
        &collapsed
    } else {
        &request.line_items
    };

    for (i, item) in items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((
            format!("{}[price_data][currency]", prefix),
            request.currency.clone(),
        ));
        form.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.name.clone(),
        ));
        form.push((
            format!("{}[price_data][unit_amount]", prefix),
            item.unit_amount_cents.to_string(),
        ));
        form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let secret_key = self.secret_key.as_ref().ok_or(PaymentError::NotConfigured)?;

        let response = self
            .http_client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(secret_key)
            .form(&checkout_form(request))
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api(status.as_u16(), error_text));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        debug!(order_id = %request.order_id, session_id = %session.id, "Checkout session created");
        Ok(session)
    }
}

// ============================================================================
// Webhooks
// ============================================================================

/// Compute a `Stripe-Signature` header value for `payload`
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

/// Check a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against the raw body
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".into()));
    }
    let skew = now.checked_sub(timestamp).map(i64::unsigned_abs);
    if !skew.is_some_and(|skew| skew <= SIGNATURE_TOLERANCE_SECS.unsigned_abs()) {
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance".into()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|sig| match hex::decode(sig) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".into()))
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: RawSession,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    id: String,
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Webhook events this service acts on
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    CheckoutCompleted {
        session_id: String,
        order_id: Option<String>,
    },
    CheckoutExpired {
        session_id: String,
        order_id: Option<String>,
    },
    Ignored(String),
}

pub fn parse_event(payload: &[u8]) -> Result<PaymentEvent, PaymentError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| PaymentError::Parse(e.to_string()))?;

    let event_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| PaymentError::Parse("missing event type".into()))?
        .to_string();

    if event_type != "checkout.session.completed" && event_type != "checkout.session.expired" {
        return Ok(PaymentEvent::Ignored(event_type));
    }

    let event: RawEvent = serde_json::from_value(value).map_err(|e| PaymentError::Parse(e.to_string()))?;
    let session = event.data.object;
    let order_id = session
        .metadata
        .get("order_id")
        .cloned()
        .or(session.client_reference_id);

    Ok(if event.event_type == "checkout.session.completed" {
        PaymentEvent::CheckoutCompleted {
            session_id: session.id,
            order_id,
        }
    } else {
        PaymentEvent::CheckoutExpired {
            session_id: session.id,
            order_id,
        }
    })
}
