//! Authentication: password hashing, sessions and request extractors
//!
//! Clients send `Authorization: Bearer <token>`. Handlers declare what they
//! need through the extractor they take:
//! - `CurrentUser`: any signed-in user, 401 otherwise
//! - `AdminUser`: role `admin`, 403 for other users
//! - `MaybeUser`: optional, never rejects a missing token

pub mod password;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use tracing::debug;

use crate::db::{sessions, users::User};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Sessions live for 30 days
pub const SESSION_DAYS: i64 = 30;

/// Create a session for `user_id` and return its token
pub async fn start_session(state: &AppState, user_id: &str) -> ApiResult<String> {
    let token = password::generate_session_token();
    let now = Utc::now();
    sessions::create_session(&state.db, &token, user_id, now, now + Duration::days(SESSION_DAYS)).await?;
    Ok(token)
}

/// Token from an `Authorization: Bearer` header
pub fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

async fn resolve_user(parts: &Parts, state: &AppState) -> ApiResult<Option<User>> {
    let Some(token) = bearer_token(parts) else {
        return Ok(None);
    };

    let user = sessions::find_session_user(&state.db, &token, Utc::now()).await?;
    if user.is_none() {
        debug!("Rejected unknown or expired session token");
    }
    Ok(user)
}

/// Signed-in user with the session token used for the request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        let user = resolve_user(parts, state)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;

        Ok(CurrentUser { user, token })
    }
}

/// Signed-in user with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

/// User when a valid token was sent, `None` otherwise
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_user(parts, state).await?))
    }
}

/// Owners see their own records, admins see everything
pub fn ensure_owner_or_admin(user: &User, owner_id: Option<&str>) -> ApiResult<()> {
    if user.is_admin() || owner_id == Some(user.guid.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not allowed to access this resource".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc123"))).as_deref(), Some("abc123"));
        assert_eq!(bearer_token(&parts_with(Some("bearer  abc123 "))).as_deref(), Some("abc123"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }
}
