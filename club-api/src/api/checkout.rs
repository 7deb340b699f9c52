//! Checkout: cart → pending order → hosted payment session

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info};

use crate::api::{auth::validate_email, optional_text, parse_id, ApiJson};
use crate::auth::MaybeUser;
use crate::db::{
    self,
    orders::{Order, OrderItem},
};
use crate::error::{ApiError, ApiResult};
use crate::services::fulfillment;
use crate::services::payments::{CheckoutSessionRequest, LineItem};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CartItem {
    Ticket { tier_id: String, quantity: Option<i64> },
    Product { product_id: String, quantity: Option<i64> },
    Subscription { plan_id: String },
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub status: String,
    pub session_id: Option<String>,
    pub checkout_url: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

/// Upper bound for one cart line
pub const MAX_LINE_QUANTITY: i64 = 1000;

fn quantity(value: Option<i64>) -> ApiResult<i64> {
    match value.unwrap_or(1) {
        q if (1..=MAX_LINE_QUANTITY).contains(&q) => Ok(q),
        q => Err(ApiError::BadRequest {
            message: format!("Quantity must be between 1 and {}", MAX_LINE_QUANTITY),
            details: Some(json!({ "quantity": q })),
        }),
    }
}

/// Add `qty` to the running total for one tier or product
fn add_requested(requested: &mut HashMap<String, i64>, key: &str, qty: i64) -> ApiResult<i64> {
    let total = requested.entry(key.to_string()).or_insert(0);
    *total = total
        .checked_add(qty)
        .ok_or_else(|| ApiError::bad_request("Requested quantity is too large"))?;
    Ok(*total)
}

/// Sum of `unit price * quantity`, or 400 when it does not fit in cents
fn cart_subtotal(items: &[OrderItem]) -> ApiResult<i64> {
    items
        .iter()
        .try_fold(0i64, |sum, item| {
            item.unit_price_cents
                .checked_mul(item.quantity)
                .and_then(|line| sum.checked_add(line))
        })
        .ok_or_else(|| ApiError::bad_request("Order total is too large"))
}

/// Resolve every cart line against the catalogue
async fn price_cart(
    state: &AppState,
    order_id: &str,
    items: &[CartItem],
    signed_in: bool,
) -> ApiResult<Vec<OrderItem>> {
    let now = Utc::now();
    let mut lines = Vec::with_capacity(items.len());
    // Requested quantity per tier/product across duplicate lines
    let mut requested: HashMap<String, i64> = HashMap::new();

    for item in items {
        let line = match item {
            CartItem::Ticket { tier_id, quantity: qty } => {
                let tier_id = parse_id(tier_id)?;
                let qty = quantity(*qty)?;
                let tier = db::events::find_tier(&state.db, &tier_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Pricing tier"))?;
                let event = db::events::find_event(&state.db, &tier.event_id)
                    .await?
                    .filter(|e| e.is_published)
                    .ok_or_else(|| ApiError::not_found("Event"))?;

                if event.starts_at <= now {
                    return Err(ApiError::bad_request(format!("Event has already started: {}", event.title)));
                }
                if add_requested(&mut requested, &tier.guid, qty)? > tier.remaining() {
                    return Err(ApiError::BadRequest {
                        message: format!("Not enough tickets left for {} - {}", event.title, tier.name),
                        details: Some(json!({ "tier_id": tier.guid, "remaining": tier.remaining() })),
                    });
                }

                OrderItem {
                    guid: club_common::ids::generate(),
                    order_id: order_id.to_string(),
                    item_type: db::orders::ITEM_TICKET.to_string(),
                    item_ref: tier.guid,
                    description: format!("{} - {}", event.title, tier.name),
                    quantity: qty,
                    unit_price_cents: tier.price_cents,
                }
            }
            CartItem::Product { product_id, quantity: qty } => {
                let product_id = parse_id(product_id)?;
                let qty = quantity(*qty)?;
                let product = db::products::find_product(&state.db, &product_id)
                    .await?
                    .filter(|p| p.is_active)
                    .ok_or_else(|| ApiError::not_found("Product"))?;

                if add_requested(&mut requested, &product.guid, qty)? > product.stock {
                    return Err(ApiError::BadRequest {
                        message: format!("Not enough stock for {}", product.name),
                        details: Some(json!({ "product_id": product.guid, "stock": product.stock })),
                    });
                }

                OrderItem {
                    guid: club_common::ids::generate(),
                    order_id: order_id.to_string(),
                    item_type: db::orders::ITEM_PRODUCT.to_string(),
                    item_ref: product.guid,
                    description: product.name,
                    quantity: qty,
                    unit_price_cents: product.price_cents,
                }
            }
            CartItem::Subscription { plan_id } => {
                if !signed_in {
                    return Err(ApiError::Unauthorized(
                        "Sign in to buy a membership".to_string(),
                    ));
                }
                let plan_id = parse_id(plan_id)?;
                let plan = db::subscriptions::find_plan(&state.db, &plan_id)
                    .await?
                    .filter(|p| p.is_active)
                    .ok_or_else(|| ApiError::not_found("Subscription plan"))?;

                OrderItem {
                    guid: club_common::ids::generate(),
                    order_id: order_id.to_string(),
                    item_type: db::orders::ITEM_SUBSCRIPTION.to_string(),
                    item_ref: plan.guid,
                    description: format!("Membership: {}", plan.name),
                    quantity: 1,
                    unit_price_cents: plan.price_cents,
                }
            }
        };
        lines.push(line);
    }

    Ok(lines)
}

/// POST /api/checkout
pub async fn checkout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiJson(req): ApiJson<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    if req.items.is_empty() {
        return Err(ApiError::bad_request("Cart is empty"));
    }

    let customer_email = match (optional_text(req.customer_email), &user) {
        (Some(email), _) => validate_email(&email)?,
        (None, Some(user)) => user.email.clone(),
        (None, None) => return Err(ApiError::bad_request("Missing required field: customer_email")),
    };
    let customer_name = optional_text(req.customer_name)
        .or_else(|| user.as_ref().and_then(|u| u.full_name.clone()));

    let order_id = club_common::ids::generate();
    let items = price_cart(&state, &order_id, &req.items, user.is_some()).await?;
    let subtotal_cents = cart_subtotal(&items)?;

    let (coupon_id, discount_cents) = match optional_text(req.coupon_code) {
        Some(code) => {
            let (coupon, discount) = crate::api::coupons::apply_coupon(&state, &code, subtotal_cents).await?;
            (Some(coupon.guid), discount)
        }
        None => (None, 0),
    };
    let total_cents = subtotal_cents - discount_cents;

    let now = Utc::now();
    let order = Order {
        guid: order_id.clone(),
        user_id: user.as_ref().map(|u| u.guid.clone()),
        customer_email,
        customer_name,
        status: db::orders::STATUS_PENDING.to_string(),
        subtotal_cents,
        discount_cents,
        total_cents,
        coupon_id,
        payment_session_id: None,
        created_at: now,
        updated_at: now,
        paid_at: None,
    };

    let mut tx = state.db.begin().await?;
    db::orders::insert_order(&mut *tx, &order).await?;
    for item in &items {
        db::orders::insert_item(&mut *tx, item).await?;
    }
    tx.commit().await?;

    info!(order_id = %order_id, items = items.len(), total_cents, "Order created");

    if total_cents == 0 {
        fulfillment::fulfill_order(&state, &order_id).await?;
        return Ok((
            StatusCode::CREATED,
            Json(CheckoutResponse {
                order_id,
                status: db::orders::STATUS_PAID.to_string(),
                session_id: None,
                checkout_url: None,
                subtotal_cents,
                discount_cents,
                total_cents,
            }),
        ));
    }

    let request = CheckoutSessionRequest {
        order_id: order_id.clone(),
        customer_email: order.customer_email.clone(),
        currency: state.config.payments.currency.clone(),
        line_items: items
            .iter()
            .map(|i| LineItem {
                name: i.description.clone(),
                unit_amount_cents: i.unit_price_cents,
                quantity: i.quantity,
            })
            .collect(),
        discount_cents,
        total_cents,
        success_url: state.config.success_url(&order_id),
        cancel_url: state.config.cancel_url(&order_id),
    };

    let session = match state.payments.create_checkout_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            error!(order_id = %order_id, "Payment session creation failed: {}", e);
            db::orders::mark_cancelled(&state.db, &order_id, Utc::now()).await?;
            return Err(e.into());
        }
    };

    db::orders::set_payment_session(&state.db, &order_id, &session.id, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id,
            status: db::orders::STATUS_PENDING.to_string(),
            session_id: Some(session.id),
            checkout_url: session.url,
            subtotal_cents,
            discount_cents,
            total_cents,
        }),
    ))
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/api/checkout", post(checkout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit_price_cents: i64, quantity: i64) -> OrderItem {
        OrderItem {
            guid: club_common::ids::generate(),
            order_id: "order".to_string(),
            item_type: db::orders::ITEM_PRODUCT.to_string(),
            item_ref: "product".to_string(),
            description: "Scarf".to_string(),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(quantity(None).ok(), Some(1));
        assert_eq!(quantity(Some(MAX_LINE_QUANTITY)).ok(), Some(MAX_LINE_QUANTITY));
        assert!(quantity(Some(0)).is_err());
        assert!(quantity(Some(MAX_LINE_QUANTITY + 1)).is_err());
        assert!(quantity(Some(i64::MAX)).is_err());
    }

    #[test]
    fn test_requested_total_saturates_to_error() {
        let mut requested = HashMap::new();
        assert_eq!(add_requested(&mut requested, "tier", 3).ok(), Some(3));
        assert_eq!(add_requested(&mut requested, "tier", 2).ok(), Some(5));
        assert!(add_requested(&mut requested, "tier", i64::MAX).is_err());
    }

    #[test]
    fn test_cart_subtotal_overflow_is_rejected() {
        assert_eq!(cart_subtotal(&[line(1500, 2), line(999, 1)]).ok(), Some(3999));
        assert!(cart_subtotal(&[line(i64::MAX, 2)]).is_err());
        assert!(cart_subtotal(&[line(i64::MAX, 1), line(1, 1)]).is_err());
    }
}
