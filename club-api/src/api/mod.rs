//! HTTP API handlers for club-api

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod contact;
pub mod coupons;
pub mod events;
pub mod fixtures;
pub mod health;
pub mod orders;
pub mod posts;
pub mod shop;
pub mod subscriptions;
pub mod teams;
pub mod tickets;
pub mod webhooks;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use checkout::checkout_routes;
pub use contact::contact_routes;
pub use coupons::coupon_routes;
pub use events::event_routes;
pub use fixtures::fixture_routes;
pub use health::health_routes;
pub use orders::order_routes;
pub use posts::post_routes;
pub use shop::shop_routes;
pub use subscriptions::subscription_routes;
pub use teams::team_routes;
pub use tickets::ticket_routes;
pub use webhooks::webhook_routes;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

/// JSON body extractor whose rejections use the API error format
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text())))?;
        Ok(ApiJson(value))
    }
}

/// Validate an id taken from the path
pub fn parse_id(raw: &str) -> ApiResult<String> {
    Ok(club_common::ids::parse(raw)?)
}

/// Parse a required timestamp field
pub fn require_timestamp(value: Option<&str>, field: &str) -> ApiResult<chrono::DateTime<chrono::Utc>> {
    let raw = crate::error::require_text(value, field)?;
    parse_timestamp_field(&raw, field)
}

/// Parse an optional timestamp field; blank counts as absent
pub fn optional_timestamp(
    value: Option<&str>,
    field: &str,
) -> ApiResult<Option<chrono::DateTime<chrono::Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse_timestamp_field(raw, field).map(Some),
        None => Ok(None),
    }
}

fn parse_timestamp_field(raw: &str, field: &str) -> ApiResult<chrono::DateTime<chrono::Utc>> {
    club_common::time::parse_timestamp(raw)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid timestamp for {}: {}", field, raw)))
}

/// Trim an optional text field, mapping blank to `None`
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn require_non_negative(value: i64, field: &str) -> ApiResult<i64> {
    if value < 0 {
        Err(ApiError::bad_request(format!("{} must not be negative", field)))
    } else {
        Ok(value)
    }
}
