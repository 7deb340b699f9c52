//! Ticket PDFs and membership cards: render, store, fetch

use tracing::{info, warn};

use crate::db::subscriptions::{self, SubscriptionDetails};
use crate::db::tickets::{self, TicketDetails};
use crate::error::ApiResult;
use crate::services::pdf::PassDocument;
use crate::services::qr::TokenKind;
use crate::services::storage::StorageError;
use crate::AppState;

const PDF_CONTENT_TYPE: &str = "application/pdf";

pub fn ticket_document(ticket: &TicketDetails) -> PassDocument {
    let mut details = vec![(
        "Date".to_string(),
        ticket.event_starts_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    )];
    if let Some(venue) = &ticket.event_venue {
        details.push(("Venue".to_string(), venue.clone()));
    }

    PassDocument {
        kind: TokenKind::Ticket,
        title: ticket.event_title.clone(),
        subtitle: Some(ticket.tier_name.clone()),
        holder: ticket
            .ticket
            .holder_name
            .clone()
            .unwrap_or_else(|| ticket.ticket.holder_email.clone()),
        details,
        token: ticket.ticket.qr_token.clone(),
    }
}

pub fn card_document(subscription: &SubscriptionDetails) -> PassDocument {
    let s = &subscription.subscription;
    PassDocument {
        kind: TokenKind::Subscription,
        title: subscription.plan_name.clone(),
        subtitle: Some("Club membership".to_string()),
        holder: subscription
            .user_name
            .clone()
            .unwrap_or_else(|| subscription.user_email.clone()),
        details: vec![
            ("Valid from".to_string(), s.starts_at.format("%Y-%m-%d").to_string()),
            ("Valid until".to_string(), s.ends_at.format("%Y-%m-%d").to_string()),
        ],
        token: s.qr_token.clone(),
    }
}

/// Stored PDF for a ticket, rendering and storing it first when missing
pub async fn ensure_ticket_pdf(state: &AppState, ticket: &TicketDetails) -> ApiResult<Vec<u8>> {
    if let Some(path) = &ticket.ticket.pdf_path {
        match state.storage.get(path).await {
            Ok(bytes) => return Ok(bytes),
            Err(StorageError::NotFound(_)) => {
                warn!(ticket_id = %ticket.ticket.guid, path = %path, "Stored ticket PDF missing, re-rendering")
            }
            Err(e) => return Err(e.into()),
        }
    }

    let bytes = state.pdf.render(&ticket_document(ticket)).await?;
    let path = format!("tickets/{}.pdf", ticket.ticket.guid);
    let stored = state.storage.put(&path, bytes.clone(), PDF_CONTENT_TYPE).await?;
    tickets::set_pdf_path(&state.db, &ticket.ticket.guid, &stored).await?;

    info!(ticket_id = %ticket.ticket.guid, path = %stored, "Ticket PDF stored");
    Ok(bytes)
}

/// Stored membership card, rendering and storing it first when missing
pub async fn ensure_subscription_card(
    state: &AppState,
    subscription: &SubscriptionDetails,
) -> ApiResult<Vec<u8>> {
    let id = &subscription.subscription.guid;
    if let Some(path) = &subscription.subscription.card_path {
        match state.storage.get(path).await {
            Ok(bytes) => return Ok(bytes),
            Err(StorageError::NotFound(_)) => {
                warn!(subscription_id = %id, path = %path, "Stored membership card missing, re-rendering")
            }
            Err(e) => return Err(e.into()),
        }
    }

    let bytes = state.pdf.render(&card_document(subscription)).await?;
    let path = format!("subscriptions/{}.pdf", id);
    let stored = state.storage.put(&path, bytes.clone(), PDF_CONTENT_TYPE).await?;
    subscriptions::set_card_path(&state.db, id, &stored).await?;

    info!(subscription_id = %id, path = %stored, "Membership card stored");
    Ok(bytes)
}
