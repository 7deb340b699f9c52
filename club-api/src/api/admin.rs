//! Admin dashboard, user roles and scrape trigger

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::api::{optional_text, parse_id, ApiJson};
use crate::auth::AdminUser;
use crate::db::{
    self,
    dashboard::Dashboard,
    users::{User, ROLE_ADMIN, ROLE_MEMBER},
    LAST_SCRAPE_SETTING,
};
use crate::error::{require_text, ApiError, ApiResult};
use crate::scraper::{LffScraper, ScrapeOptions, ScrapeReport};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    pub fixtures_path: Option<String>,
    pub standings_path: Option<String>,
    pub include_details: Option<bool>,
}

/// GET /api/admin/dashboard
pub async fn dashboard(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Dashboard>> {
    let mut dashboard = db::dashboard::load_dashboard(&state.db, Utc::now()).await?;
    dashboard.last_scrape_at = club_common::db::get_setting(&state.db, LAST_SCRAPE_SETTING).await?;
    Ok(Json(dashboard))
}

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(db::users::list_users(&state.db).await?))
}

/// POST /api/admin/users/:id/role
///
/// Admins cannot demote themselves.
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&id)?;
    let role = require_text(req.role.as_deref(), "role")?.to_lowercase();
    if role != ROLE_MEMBER && role != ROLE_ADMIN {
        return Err(ApiError::bad_request(format!(
            "Unknown role: {} (expected {} or {})",
            role, ROLE_MEMBER, ROLE_ADMIN
        )));
    }
    if id == admin.guid && role != ROLE_ADMIN {
        return Err(ApiError::bad_request("Admins cannot remove their own admin role"));
    }

    if !db::users::set_role(&state.db, &id, &role, Utc::now()).await? {
        return Err(ApiError::not_found("User"));
    }
    let user = db::users::find_user(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!(user_id = %user.guid, role = %user.role, changed_by = %admin.guid, "User role changed");
    Ok(Json(user))
}

/// POST /api/admin/scrape
pub async fn run_scrape(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: Option<ApiJson<ScrapeRequest>>,
) -> ApiResult<Json<ScrapeReport>> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let options = ScrapeOptions {
        fixtures_path: optional_text(req.fixtures_path),
        standings_path: optional_text(req.standings_path),
        include_details: req.include_details,
    };

    let scraper = LffScraper::new(state.config.scraper.clone())?;
    let mut report = scraper.run(&state.db, &options).await?;
    if report.last_scrape_at.is_none() {
        report.last_scrape_at = club_common::db::get_setting(&state.db, LAST_SCRAPE_SETTING).await?;
    }

    Ok(Json(report))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id/role", post(set_role))
        .route("/api/admin/scrape", post(run_scrape))
}
