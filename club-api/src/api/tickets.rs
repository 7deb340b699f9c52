//! Tickets: holder downloads and gate scanning

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::{parse_id, ApiJson};
use crate::auth::{ensure_owner_or_admin, AdminUser, CurrentUser};
use crate::db::{self, tickets::TicketDetails};
use crate::error::{require_text, ApiError, ApiResult};
use crate::services::documents;
use crate::services::qr::{self, TokenKind};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Scanned QR payload or bare token
    pub qr: Option<String>,
}

/// Binary response with a content type and an inline filename
pub fn file_response(bytes: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn load_owned_ticket(state: &AppState, current: &CurrentUser, id: &str) -> ApiResult<TicketDetails> {
    let id = parse_id(id)?;
    let ticket = db::tickets::find_ticket_details(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;
    ensure_owner_or_admin(&current.user, ticket.ticket.user_id.as_deref())?;
    Ok(ticket)
}

/// GET /api/tickets
pub async fn my_tickets(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<TicketDetails>>> {
    Ok(Json(
        db::tickets::list_tickets_for_user(&state.db, &current.user.guid).await?,
    ))
}

/// GET /api/tickets/:id/pdf
pub async fn ticket_pdf(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let ticket = load_owned_ticket(&state, &current, &id).await?;
    let bytes = documents::ensure_ticket_pdf(&state, &ticket).await?;
    Ok(file_response(
        bytes,
        "application/pdf",
        &format!("ticket-{}.pdf", ticket.ticket.guid),
    ))
}

/// GET /api/tickets/:id/qr
pub async fn ticket_qr(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let ticket = load_owned_ticket(&state, &current, &id).await?;
    let png = qr::render_png(TokenKind::Ticket, &ticket.ticket.qr_token)?;
    Ok(file_response(
        png,
        "image/png",
        &format!("ticket-{}.png", ticket.ticket.guid),
    ))
}

/// GET /api/admin/events/:id/tickets
pub async fn event_tickets(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Vec<TicketDetails>>> {
    let event_id = parse_id(&event_id)?;
    if db::events::find_event(&state.db, &event_id).await?.is_none() {
        return Err(ApiError::not_found("Event"));
    }
    Ok(Json(
        db::tickets::list_tickets_for_event(&state.db, &event_id).await?,
    ))
}

/// POST /api/admin/tickets/verify
///
/// Admits a valid ticket exactly once.
pub async fn verify_ticket(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> ApiResult<Json<TicketDetails>> {
    let scanned = require_text(req.qr.as_deref(), "qr")?;
    let token = qr::parse_payload(&scanned).ok_or_else(|| ApiError::not_found("Ticket"))?;

    let ticket = db::tickets::find_ticket_by_token(&state.db, &token)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;

    let rejection = |ticket: &TicketDetails| match ticket.ticket.status.as_str() {
        db::tickets::STATUS_USED => ApiError::Conflict {
            message: "Ticket has already been used".to_string(),
            details: Some(json!({ "used_at": ticket.ticket.used_at })),
        },
        status => ApiError::Conflict {
            message: format!("Ticket is {}", status),
            details: Some(json!({ "status": status })),
        },
    };

    if ticket.ticket.status != db::tickets::STATUS_VALID {
        return Err(rejection(&ticket));
    }

    if db::tickets::mark_used(&state.db, &ticket.ticket.guid, Utc::now()).await? == 0 {
        // Lost a race with another scanner
        let current = db::tickets::find_ticket_details(&state.db, &ticket.ticket.guid)
            .await?
            .ok_or_else(|| ApiError::not_found("Ticket"))?;
        return Err(rejection(&current));
    }

    let admitted = db::tickets::find_ticket_details(&state.db, &ticket.ticket.guid)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;

    info!(ticket_id = %admitted.ticket.guid, event_id = %admitted.ticket.event_id, scanned_by = %admin.guid, "Ticket admitted");
    Ok(Json(admitted))
}

pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tickets", get(my_tickets))
        .route("/api/tickets/:id/pdf", get(ticket_pdf))
        .route("/api/tickets/:id/qr", get(ticket_qr))
        .route("/api/admin/events/:id/tickets", get(event_tickets))
        .route("/api/admin/tickets/verify", post(verify_ticket))
}
