//! Membership plans and subscriptions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::api::{optional_text, parse_id, require_non_negative, tickets::file_response, ApiJson};
use crate::auth::{ensure_owner_or_admin, AdminUser, CurrentUser};
use crate::db::{
    self,
    subscriptions::{SubscriptionDetails, SubscriptionPlan},
};
use crate::error::{require_text, ApiError, ApiResult};
use crate::services::documents;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub duration_days: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    pub expired: u64,
}

/// One hundred years
pub const MAX_PLAN_DURATION_DAYS: i64 = 36_500;

fn check_duration(days: i64) -> ApiResult<i64> {
    if (1..=MAX_PLAN_DURATION_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(ApiError::BadRequest {
            message: format!("duration_days must be between 1 and {}", MAX_PLAN_DURATION_DAYS),
            details: Some(json!({ "duration_days": days })),
        })
    }
}

/// GET /api/subscription-plans
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(db::subscriptions::list_plans(&state.db, true).await?))
}

/// GET /api/subscriptions
pub async fn my_subscriptions(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<SubscriptionDetails>>> {
    let now = Utc::now();
    let subscriptions = db::subscriptions::list_subscriptions_for_user(&state.db, &current.user.guid)
        .await?
        .into_iter()
        .map(|s| s.with_effective_status(now))
        .collect();

    Ok(Json(subscriptions))
}

/// GET /api/subscriptions/:id/card
pub async fn subscription_card(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let subscription = db::subscriptions::find_subscription_details(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription"))?;
    ensure_owner_or_admin(&current.user, Some(subscription.subscription.user_id.as_str()))?;

    let bytes = documents::ensure_subscription_card(&state, &subscription).await?;
    Ok(file_response(
        bytes,
        "application/pdf",
        &format!("membership-{}.pdf", subscription.subscription.guid),
    ))
}

// ============================================================================
// Admin
// ============================================================================

/// GET /api/admin/subscription-plans
pub async fn admin_list_plans(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(db::subscriptions::list_plans(&state.db, false).await?))
}

/// POST /api/admin/subscription-plans
pub async fn create_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<PlanInput>,
) -> ApiResult<(StatusCode, Json<SubscriptionPlan>)> {
    let plan = SubscriptionPlan {
        guid: club_common::ids::generate(),
        name: require_text(input.name.as_deref(), "name")?,
        description: optional_text(input.description),
        price_cents: require_non_negative(input.price_cents.unwrap_or(0), "price_cents")?,
        duration_days: check_duration(
            input
                .duration_days
                .ok_or_else(|| ApiError::bad_request("Missing required field: duration_days"))?,
        )?,
        is_active: input.is_active.unwrap_or(true),
        created_at: Utc::now(),
    };

    db::subscriptions::insert_plan(&state.db, &plan).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// PUT /api/admin/subscription-plans/:id
pub async fn update_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<PlanInput>,
) -> ApiResult<Json<SubscriptionPlan>> {
    let id = parse_id(&id)?;
    let mut plan = db::subscriptions::find_plan(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription plan"))?;

    if input.name.is_some() {
        plan.name = require_text(input.name.as_deref(), "name")?;
    }
    if input.description.is_some() {
        plan.description = optional_text(input.description);
    }
    if let Some(price) = input.price_cents {
        plan.price_cents = require_non_negative(price, "price_cents")?;
    }
    if let Some(days) = input.duration_days {
        plan.duration_days = check_duration(days)?;
    }
    if let Some(active) = input.is_active {
        plan.is_active = active;
    }

    db::subscriptions::update_plan(&state.db, &plan).await?;
    Ok(Json(plan))
}

/// DELETE /api/admin/subscription-plans/:id
///
/// Plans referenced by subscriptions are kept; deactivate them instead.
pub async fn delete_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if db::subscriptions::delete_plan(&state.db, &id).await? == 0 {
        return Err(ApiError::not_found("Subscription plan"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/subscriptions
pub async fn admin_list_subscriptions(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<SubscriptionDetails>>> {
    let now = Utc::now();
    let subscriptions = db::subscriptions::list_all_subscriptions(&state.db)
        .await?
        .into_iter()
        .map(|s| s.with_effective_status(now))
        .collect();

    Ok(Json(subscriptions))
}

/// POST /api/admin/subscriptions/expire
pub async fn expire_subscriptions(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ExpireResponse>> {
    let expired = db::subscriptions::expire_due(&state.db, Utc::now()).await?;
    info!(expired, "Expired subscriptions swept");
    Ok(Json(ExpireResponse { expired }))
}

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/api/subscription-plans", get(list_plans))
        .route("/api/subscriptions", get(my_subscriptions))
        .route("/api/subscriptions/:id/card", get(subscription_card))
        .route("/api/admin/subscription-plans", get(admin_list_plans).post(create_plan))
        .route("/api/admin/subscription-plans/:id", put(update_plan).delete(delete_plan))
        .route("/api/admin/subscriptions", get(admin_list_subscriptions))
        .route("/api/admin/subscriptions/expire", post(expire_subscriptions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_duration() {
        assert_eq!(check_duration(1).ok(), Some(1));
        assert_eq!(check_duration(365).ok(), Some(365));
        assert_eq!(check_duration(MAX_PLAN_DURATION_DAYS).ok(), Some(MAX_PLAN_DURATION_DAYS));
        assert!(check_duration(0).is_err());
        assert!(check_duration(MAX_PLAN_DURATION_DAYS + 1).is_err());
        assert!(check_duration(9_000_000_000_000).is_err());
    }
}
