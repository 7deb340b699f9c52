//! Contact form

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::{auth::validate_email, ApiJson};
use crate::error::{require_text, ApiError, ApiResult};
use crate::services::email;
use crate::AppState;

const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

/// POST /api/contact
///
/// Forwards the message to the club inbox with the sender as reply-to.
pub async fn submit_contact(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ContactRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let name = require_text(req.name.as_deref(), "name")?;
    let sender = validate_email(&require_text(req.email.as_deref(), "email")?)?;
    let message = require_text(req.message.as_deref(), "message")?;
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let outgoing = email::contact_message(&state.config.email.club_inbox, &name, &sender, &message);
    state.mailer.send(outgoing).await?;

    info!(from = %sender, "Contact message forwarded");
    Ok((StatusCode::ACCEPTED, Json(json!({ "sent": true }))))
}

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/api/contact", post(submit_contact))
}
