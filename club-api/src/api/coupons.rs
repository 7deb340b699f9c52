//! Coupons: admin management and public validation

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::{optional_timestamp, parse_id, require_non_negative, ApiJson};
use crate::auth::AdminUser;
use crate::db::{self, coupons::Coupon};
use crate::error::{require_text, ApiError, ApiResult};
use crate::services::pricing;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CouponInput {
    pub code: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<i64>,
    pub min_order_cents: Option<i64>,
    pub max_uses: Option<i64>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: Option<String>,
    pub subtotal_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub coupon: Coupon,
}

/// Look a code up and evaluate it against `subtotal_cents`
pub async fn apply_coupon(state: &AppState, code: &str, subtotal_cents: i64) -> ApiResult<(Coupon, i64)> {
    let coupon = db::coupons::find_coupon_by_code(&state.db, code)
        .await?
        .ok_or_else(|| ApiError::BadRequest {
            message: "Coupon not found".to_string(),
            details: Some(json!({ "code": code })),
        })?;

    let discount = pricing::evaluate_coupon(&coupon, subtotal_cents, Utc::now()).map_err(|reason| {
        ApiError::BadRequest {
            message: reason.to_string(),
            details: Some(json!({ "code": coupon.code })),
        }
    })?;

    Ok((coupon, discount))
}

fn check_validity_window(coupon: &Coupon) -> ApiResult<()> {
    match (coupon.valid_from, coupon.valid_until) {
        (Some(from), Some(until)) if until < from => {
            Err(ApiError::bad_request("valid_until must not be before valid_from"))
        }
        _ => Ok(()),
    }
}

fn check_max_uses(max_uses: Option<i64>) -> ApiResult<Option<i64>> {
    match max_uses {
        Some(n) if n < 1 => Err(ApiError::bad_request("max_uses must be at least 1")),
        other => Ok(other),
    }
}

/// POST /api/coupons/validate
pub async fn validate_coupon(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ValidateCouponRequest>,
) -> ApiResult<Json<ValidateCouponResponse>> {
    let code = require_text(req.code.as_deref(), "code")?;
    let subtotal = require_non_negative(
        req.subtotal_cents
            .ok_or_else(|| ApiError::bad_request("Missing required field: subtotal_cents"))?,
        "subtotal_cents",
    )?;

    let (coupon, discount_cents) = apply_coupon(&state, &code, subtotal).await?;
    Ok(Json(ValidateCouponResponse {
        valid: true,
        discount_cents,
        total_cents: subtotal - discount_cents,
        coupon,
    }))
}

/// GET /api/admin/coupons
pub async fn list_coupons(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(db::coupons::list_coupons(&state.db).await?))
}

/// POST /api/admin/coupons
///
/// Codes are unique ignoring case.
pub async fn create_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<CouponInput>,
) -> ApiResult<(StatusCode, Json<Coupon>)> {
    let code = require_text(input.code.as_deref(), "code")?.to_uppercase();
    let discount_type = require_text(input.discount_type.as_deref(), "discount_type")?.to_lowercase();
    let discount_value = input
        .discount_value
        .ok_or_else(|| ApiError::bad_request("Missing required field: discount_value"))?;
    pricing::validate_discount(&discount_type, discount_value).map_err(ApiError::bad_request)?;

    if db::coupons::find_coupon_by_code(&state.db, &code).await?.is_some() {
        return Err(ApiError::BadRequest {
            message: "A coupon with this code already exists".to_string(),
            details: Some(json!({ "code": code })),
        });
    }

    let coupon = Coupon {
        guid: club_common::ids::generate(),
        code,
        discount_type,
        discount_value,
        min_order_cents: require_non_negative(input.min_order_cents.unwrap_or(0), "min_order_cents")?,
        max_uses: check_max_uses(input.max_uses)?,
        used_count: 0,
        valid_from: optional_timestamp(input.valid_from.as_deref(), "valid_from")?,
        valid_until: optional_timestamp(input.valid_until.as_deref(), "valid_until")?,
        is_active: input.is_active.unwrap_or(true),
        created_at: Utc::now(),
    };
    check_validity_window(&coupon)?;

    db::coupons::insert_coupon(&state.db, &coupon).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// PUT /api/admin/coupons/:id
pub async fn update_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<CouponInput>,
) -> ApiResult<Json<Coupon>> {
    let id = parse_id(&id)?;
    let mut coupon = db::coupons::find_coupon(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Coupon"))?;

    if input.code.is_some() {
        coupon.code = require_text(input.code.as_deref(), "code")?.to_uppercase();
    }
    if input.discount_type.is_some() {
        coupon.discount_type = require_text(input.discount_type.as_deref(), "discount_type")?.to_lowercase();
    }
    if let Some(value) = input.discount_value {
        coupon.discount_value = value;
    }
    pricing::validate_discount(&coupon.discount_type, coupon.discount_value).map_err(ApiError::bad_request)?;

    if let Some(min) = input.min_order_cents {
        coupon.min_order_cents = require_non_negative(min, "min_order_cents")?;
    }
    if input.max_uses.is_some() {
        coupon.max_uses = check_max_uses(input.max_uses)?;
    }
    if input.valid_from.is_some() {
        coupon.valid_from = optional_timestamp(input.valid_from.as_deref(), "valid_from")?;
    }
    if input.valid_until.is_some() {
        coupon.valid_until = optional_timestamp(input.valid_until.as_deref(), "valid_until")?;
    }
    if let Some(active) = input.is_active {
        coupon.is_active = active;
    }
    check_validity_window(&coupon)?;

    // A clash with another code surfaces as a unique violation (400)
    db::coupons::update_coupon(&state.db, &coupon).await?;
    Ok(Json(coupon))
}

/// DELETE /api/admin/coupons/:id
pub async fn delete_coupon(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if db::coupons::delete_coupon(&state.db, &id).await? == 0 {
        return Err(ApiError::not_found("Coupon"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/api/coupons/validate", post(validate_coupon))
        .route("/api/admin/coupons", get(list_coupons).post(create_coupon))
        .route("/api/admin/coupons/:id", put(update_coupon).delete(delete_coupon))
}
