//! Events and pricing tiers
//!
//! Public listing shows published events only; admin routes manage
//! everything, including tiers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::api::{optional_text, optional_timestamp, parse_id, require_non_negative, require_timestamp, ApiJson};
use crate::auth::AdminUser;
use crate::db::{
    self,
    events::{Event, EventWithTiers, PricingTier, TierView},
};
use crate::error::{require_text, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub upcoming: bool,
}

#[derive(Debug, Deserialize)]
pub struct TierInput {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EventInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub image_url: Option<String>,
    pub is_published: Option<bool>,
    pub tiers: Option<Vec<TierInput>>,
}

fn build_tier(event_id: &str, input: &TierInput) -> ApiResult<PricingTier> {
    Ok(PricingTier {
        guid: club_common::ids::generate(),
        event_id: event_id.to_string(),
        name: require_text(input.name.as_deref(), "tier name")?,
        price_cents: require_non_negative(input.price_cents.unwrap_or(0), "price_cents")?,
        quantity: require_non_negative(input.quantity.unwrap_or(0), "quantity")?,
        sold: 0,
        created_at: Utc::now(),
    })
}

fn check_schedule(event: &Event) -> ApiResult<()> {
    match event.ends_at {
        Some(ends_at) if ends_at < event.starts_at => {
            Err(ApiError::bad_request("ends_at must not be before starts_at"))
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Public
// ============================================================================

/// GET /api/events?upcoming=bool
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<EventWithTiers>>> {
    let after = query.upcoming.then(Utc::now);
    let events = db::events::list_events(&state.db, true, after).await?;
    Ok(Json(db::events::attach_tiers(&state.db, events).await?))
}

/// GET /api/events/:id
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EventWithTiers>> {
    let id = parse_id(&id)?;
    let event = db::events::find_event(&state.db, &id)
        .await?
        .filter(|e| e.is_published)
        .ok_or_else(|| ApiError::not_found("Event"))?;

    Ok(Json(db::events::event_with_tiers(&state.db, event).await?))
}

// ============================================================================
// Admin
// ============================================================================

/// GET /api/admin/events
pub async fn admin_list_events(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<EventWithTiers>>> {
    let events = db::events::list_events(&state.db, false, None).await?;
    Ok(Json(db::events::attach_tiers(&state.db, events).await?))
}

/// POST /api/admin/events
///
/// Tiers given in the body are created in the same transaction.
pub async fn create_event(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<EventInput>,
) -> ApiResult<(StatusCode, Json<EventWithTiers>)> {
    let now = Utc::now();
    let event = Event {
        guid: club_common::ids::generate(),
        title: require_text(input.title.as_deref(), "title")?,
        description: optional_text(input.description),
        venue: optional_text(input.venue),
        starts_at: require_timestamp(input.starts_at.as_deref(), "starts_at")?,
        ends_at: optional_timestamp(input.ends_at.as_deref(), "ends_at")?,
        image_url: optional_text(input.image_url),
        is_published: input.is_published.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    check_schedule(&event)?;

    let tiers = input
        .tiers
        .unwrap_or_default()
        .iter()
        .map(|tier| build_tier(&event.guid, tier))
        .collect::<ApiResult<Vec<_>>>()?;

    let mut tx = state.db.begin().await?;
    db::events::insert_event(&mut *tx, &event).await?;
    for tier in &tiers {
        db::events::insert_tier(&mut *tx, tier).await?;
    }
    tx.commit().await?;

    info!(event_id = %event.guid, tiers = tiers.len(), "Event created");
    Ok((
        StatusCode::CREATED,
        Json(EventWithTiers {
            event,
            pricing_tiers: tiers.into_iter().map(TierView::from).collect(),
        }),
    ))
}

/// PUT /api/admin/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<EventInput>,
) -> ApiResult<Json<EventWithTiers>> {
    let id = parse_id(&id)?;
    let mut event = db::events::find_event(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;

    if input.title.is_some() {
        event.title = require_text(input.title.as_deref(), "title")?;
    }
    if input.description.is_some() {
        event.description = optional_text(input.description);
    }
    if input.venue.is_some() {
        event.venue = optional_text(input.venue);
    }
    if input.starts_at.is_some() {
        event.starts_at = require_timestamp(input.starts_at.as_deref(), "starts_at")?;
    }
    if input.ends_at.is_some() {
        event.ends_at = optional_timestamp(input.ends_at.as_deref(), "ends_at")?;
    }
    if input.image_url.is_some() {
        event.image_url = optional_text(input.image_url);
    }
    if let Some(published) = input.is_published {
        event.is_published = published;
    }
    check_schedule(&event)?;
    event.updated_at = Utc::now();

    db::events::update_event(&state.db, &event).await?;
    Ok(Json(db::events::event_with_tiers(&state.db, event).await?))
}

/// DELETE /api/admin/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if db::events::find_event(&state.db, &id).await?.is_none() {
        return Err(ApiError::not_found("Event"));
    }

    let issued = db::tickets::count_tickets_for_event(&state.db, &id).await?;
    if issued > 0 {
        return Err(ApiError::Conflict {
            message: "Event has issued tickets and cannot be deleted".to_string(),
            details: Some(serde_json::json!({ "tickets": issued })),
        });
    }

    let pending = db::orders::count_pending_event_units(&state.db, &id).await?;
    if pending > 0 {
        return Err(ApiError::Conflict {
            message: "Event has tickets on unpaid orders and cannot be deleted".to_string(),
            details: Some(serde_json::json!({ "pending_tickets": pending })),
        });
    }

    db::events::delete_event(&state.db, &id).await?;
    info!(event_id = %id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/events/:id/tiers
pub async fn create_tier(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
    ApiJson(input): ApiJson<TierInput>,
) -> ApiResult<(StatusCode, Json<TierView>)> {
    let event_id = parse_id(&event_id)?;
    if db::events::find_event(&state.db, &event_id).await?.is_none() {
        return Err(ApiError::not_found("Event"));
    }

    let tier = build_tier(&event_id, &input)?;
    db::events::insert_tier(&state.db, &tier).await?;
    Ok((StatusCode::CREATED, Json(tier.into())))
}

/// PUT /api/admin/tiers/:id
pub async fn update_tier(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<TierInput>,
) -> ApiResult<Json<TierView>> {
    let id = parse_id(&id)?;
    let mut tier = db::events::find_tier(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Pricing tier"))?;

    if input.name.is_some() {
        tier.name = require_text(input.name.as_deref(), "tier name")?;
    }
    if let Some(price) = input.price_cents {
        tier.price_cents = require_non_negative(price, "price_cents")?;
    }
    if let Some(quantity) = input.quantity {
        if quantity < tier.sold {
            return Err(ApiError::BadRequest {
                message: "Quantity cannot be lower than tickets already sold".to_string(),
                details: Some(serde_json::json!({ "sold": tier.sold })),
            });
        }
        tier.quantity = quantity;
    }

    db::events::update_tier(&state.db, &tier).await?;
    Ok(Json(tier.into()))
}

/// DELETE /api/admin/tiers/:id
pub async fn delete_tier(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    let tier = db::events::find_tier(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Pricing tier"))?;

    if tier.sold > 0 {
        return Err(ApiError::conflict("Tier has sold tickets and cannot be deleted"));
    }
    let pending = db::orders::count_pending_tier_units(&state.db, &id).await?;
    if pending > 0 {
        return Err(ApiError::Conflict {
            message: "Tier has tickets on unpaid orders and cannot be deleted".to_string(),
            details: Some(serde_json::json!({ "pending_tickets": pending })),
        });
    }

    db::events::delete_tier(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events))
        .route("/api/events/:id", get(get_event))
        .route("/api/admin/events", get(admin_list_events).post(create_event))
        .route("/api/admin/events/:id", put(update_event).delete(delete_event))
        .route("/api/admin/events/:id/tiers", post(create_tier))
        .route("/api/admin/tiers/:id", put(update_tier).delete(delete_tier))
}
