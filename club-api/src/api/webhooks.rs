//! Payment provider webhooks

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::services::fulfillment;
use crate::services::payments::{self, PaymentEvent};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Order named by the event, falling back to the stored session id
async fn resolve_order_id(state: &AppState, session_id: &str, order_id: Option<String>) -> ApiResult<Option<String>> {
    if order_id.is_some() {
        return Ok(order_id);
    }
    Ok(db::orders::find_order_by_session(&state.db, session_id)
        .await?
        .map(|order| order.guid))
}

/// POST /api/webhooks/payments
///
/// The raw body is verified against the `Stripe-Signature` header before it
/// is parsed.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let secret = state
        .config
        .payments
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("Webhook secret is not configured".to_string()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe-Signature header"))?;

    payments::verify_webhook_signature(&body, signature, secret, Utc::now().timestamp())?;

    match payments::parse_event(&body)? {
        PaymentEvent::CheckoutCompleted { session_id, order_id } => {
            let Some(order_id) = resolve_order_id(&state, &session_id, order_id).await? else {
                warn!(session_id = %session_id, "Completed session has no matching order");
                return Ok(Json(json!({ "received": true, "handled": false })));
            };

            let outcome = fulfillment::fulfill_order(&state, &order_id).await?;
            Ok(Json(json!({ "received": true, "handled": outcome.fulfilled, "order_id": order_id })))
        }
        PaymentEvent::CheckoutExpired { session_id, order_id } => {
            let Some(order_id) = resolve_order_id(&state, &session_id, order_id).await? else {
                warn!(session_id = %session_id, "Expired session has no matching order");
                return Ok(Json(json!({ "received": true, "handled": false })));
            };

            let cancelled = db::orders::mark_cancelled(&state.db, &order_id, Utc::now()).await? > 0;
            if cancelled {
                info!(order_id = %order_id, "Order cancelled after checkout session expired");
            }
            Ok(Json(json!({ "received": true, "handled": cancelled, "order_id": order_id })))
        }
        PaymentEvent::Ignored(event_type) => {
            info!(event_type = %event_type, "Ignoring payment event");
            Ok(Json(json!({ "received": true, "handled": false })))
        }
    }
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/webhooks/payments", post(payment_webhook))
}
