//! Registration, login and session endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{optional_text, ApiJson};
use crate::auth::{password, start_session, CurrentUser};
use crate::db::{self, users::User};
use crate::error::{require_text, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// Minimal shape check, delivery is the real test
pub fn validate_email(email: &str) -> ApiResult<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !email.contains(' ') => {
            Ok(email.to_lowercase())
        }
        _ => Err(ApiError::bad_request(format!("Invalid email address: {}", email))),
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let email = validate_email(&require_text(req.email.as_deref(), "email")?)?;
    let plain = req.password.unwrap_or_default();
    if plain.chars().count() < password::MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            password::MIN_PASSWORD_LENGTH
        )));
    }

    if db::users::find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::bad_request("An account with this email already exists"));
    }

    let password_hash = password::hash_password(&plain)
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;
    let now = Utc::now();
    let user = User {
        guid: club_common::ids::generate(),
        email,
        full_name: optional_text(req.full_name),
        password_hash,
        role: db::users::ROLE_MEMBER.to_string(),
        created_at: now,
        updated_at: now,
    };
    db::users::insert_user(&state.db, &user).await?;
    info!(user_id = %user.guid, "User registered");

    let token = start_session(&state, &user.guid).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { token, user })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let email = require_text(req.email.as_deref(), "email")?.to_lowercase();
    let plain = req.password.unwrap_or_default();

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());
    let user = db::users::find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&plain, &user.password_hash) {
        return Err(invalid());
    }

    let token = start_session(&state, &user.guid).await?;
    info!(user_id = %user.guid, "User logged in");
    Ok(Json(SessionResponse { token, user }))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> ApiResult<StatusCode> {
    db::sessions::delete_session(&state.db, &current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}
