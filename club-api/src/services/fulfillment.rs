//! Order fulfillment after payment
//!
//! Stock, ticket and subscription changes happen in one transaction with
//! the pending → paid transition. Documents and email follow after commit
//! and are best effort: a failure there is logged and never undoes the
//! payment.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::{coupons, events, orders, products, subscriptions, tickets};
use crate::error::{ApiError, ApiResult};
use crate::services::documents;
use crate::services::email::{self, ConfirmationLine, DocumentLink, OrderConfirmation};
use crate::services::qr::{self, TokenKind};
use crate::AppState;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FulfillmentOutcome {
    pub order_id: String,
    /// False when the order was not pending (already paid or cancelled)
    pub fulfilled: bool,
    pub tickets_issued: usize,
    pub subscriptions_started: usize,
}

/// Mark a pending order paid and issue what it bought
pub async fn fulfill_order(state: &AppState, order_id: &str) -> ApiResult<FulfillmentOutcome> {
    let now = Utc::now();
    let mut tx = state.db.begin().await?;

    let order = orders::find_order(&mut *tx, order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order"))?;

    if orders::mark_paid(&mut *tx, order_id, now).await? == 0 {
        tx.rollback().await?;
        info!(order_id = %order_id, status = %order.status, "Order not pending, skipping fulfillment");
        return Ok(FulfillmentOutcome {
            order_id: order_id.to_string(),
            fulfilled: false,
            tickets_issued: 0,
            subscriptions_started: 0,
        });
    }

    let items = orders::items_for_order(&mut *tx, order_id).await?;
    let mut tickets_issued = 0;
    let mut subscriptions_started = 0;

    for item in &items {
        match item.item_type.as_str() {
            orders::ITEM_TICKET => {
                let tier = events::find_tier(&mut *tx, &item.item_ref)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Pricing tier"))?;

                events::increment_sold(&mut *tx, &tier.guid, item.quantity)
                    .await
                    .map_err(|e| {
                        error!(order_id = %order_id, tier_id = %tier.guid, "Tier oversold on fulfillment: {}", e);
                        ApiError::from(e)
                    })?;

                for _ in 0..item.quantity {
                    let ticket = tickets::Ticket {
                        guid: club_common::ids::generate(),
                        order_id: order.guid.clone(),
                        event_id: tier.event_id.clone(),
                        tier_id: tier.guid.clone(),
                        user_id: order.user_id.clone(),
                        holder_name: order.customer_name.clone(),
                        holder_email: order.customer_email.clone(),
                        qr_token: qr::new_token(TokenKind::Ticket),
                        pdf_path: None,
                        status: tickets::STATUS_VALID.to_string(),
                        used_at: None,
                        created_at: now,
                    };
                    tickets::insert_ticket(&mut *tx, &ticket).await?;
                    tickets_issued += 1;
                }
            }
            orders::ITEM_PRODUCT => {
                products::decrement_stock(&mut *tx, &item.item_ref, item.quantity)
                    .await
                    .map_err(|e| {
                        error!(order_id = %order_id, product_id = %item.item_ref, "Product out of stock on fulfillment: {}", e);
                        ApiError::from(e)
                    })?;
            }
            orders::ITEM_SUBSCRIPTION => {
                let Some(user_id) = order.user_id.clone() else {
                    warn!(order_id = %order_id, "Subscription item on an anonymous order, skipped");
                    continue;
                };
                let plan = subscriptions::find_plan(&mut *tx, &item.item_ref)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Subscription plan"))?;
                let ends_at = Duration::try_days(plan.duration_days)
                    .and_then(|length| now.checked_add_signed(length))
                    .ok_or_else(|| {
                        ApiError::Internal(format!("Plan {} has an invalid duration", plan.guid))
                    })?;

                let subscription = subscriptions::Subscription {
                    guid: club_common::ids::generate(),
                    user_id,
                    plan_id: plan.guid.clone(),
                    order_id: Some(order.guid.clone()),
                    status: subscriptions::STATUS_ACTIVE.to_string(),
                    starts_at: now,
                    ends_at,
                    qr_token: qr::new_token(TokenKind::Subscription),
                    card_path: None,
                    created_at: now,
                };
                subscriptions::insert_subscription(&mut *tx, &subscription).await?;
                subscriptions_started += 1;
            }
            other => warn!(order_id = %order_id, item_type = %other, "Unknown order item type"),
        }
    }

    if let Some(coupon_id) = &order.coupon_id {
        // The customer already paid the discounted total; an overrun is only recorded
        if coupons::increment_usage(&mut *tx, coupon_id).await? == 0 {
            warn!(order_id = %order_id, coupon_id = %coupon_id, "Coupon usage limit overrun");
        }
    }

    tx.commit().await?;

    info!(
        order_id = %order_id,
        tickets = tickets_issued,
        subscriptions = subscriptions_started,
        total_cents = order.total_cents,
        "Order fulfilled"
    );

    deliver(state, &order, &items).await;

    Ok(FulfillmentOutcome {
        order_id: order_id.to_string(),
        fulfilled: true,
        tickets_issued,
        subscriptions_started,
    })
}

/// Render documents and send the confirmation email. Failures are logged.
async fn deliver(state: &AppState, order: &orders::Order, items: &[orders::OrderItem]) {
    let mut links = Vec::new();

    match tickets::list_tickets_for_order(&state.db, &order.guid).await {
        Ok(issued) => {
            for (i, ticket) in issued.iter().enumerate() {
                if let Err(e) = documents::ensure_ticket_pdf(state, ticket).await {
                    error!(ticket_id = %ticket.ticket.guid, "Failed to generate ticket PDF: {}", e);
                }
                links.push(DocumentLink {
                    label: format!("Ticket {} - {} ({})", i + 1, ticket.event_title, ticket.tier_name),
                    url: state.config.ticket_pdf_url(&ticket.ticket.guid),
                });
            }
        }
        Err(e) => error!(order_id = %order.guid, "Failed to load issued tickets: {}", e),
    }

    let started = match subscriptions::list_subscriptions_for_order(&state.db, &order.guid).await {
        Ok(started) => started,
        Err(e) => {
            error!(order_id = %order.guid, "Failed to load started subscriptions: {}", e);
            Vec::new()
        }
    };
    for subscription in &started {
        if let Err(e) = documents::ensure_subscription_card(state, subscription).await {
            error!(subscription_id = %subscription.subscription.guid, "Failed to generate membership card: {}", e);
        }
    }

    let lines: Vec<ConfirmationLine> = items
        .iter()
        .map(|item| ConfirmationLine {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
        })
        .collect();

    let confirmation = email::order_confirmation(&OrderConfirmation {
        order_id: &order.guid,
        customer_name: order.customer_name.as_deref(),
        customer_email: &order.customer_email,
        lines: &lines,
        discount_cents: order.discount_cents,
        total_cents: order.total_cents,
        currency: &state.config.payments.currency,
        documents: &links,
    });
    if let Err(e) = state.mailer.send(confirmation).await {
        error!(order_id = %order.guid, "Failed to send order confirmation: {}", e);
    }

    for subscription in &started {
        let card = DocumentLink {
            label: "Download your membership card".to_string(),
            url: state.config.subscription_card_url(&subscription.subscription.guid),
        };
        let welcome = email::subscription_welcome(
            &subscription.user_email,
            subscription.user_name.as_deref(),
            &subscription.plan_name,
            &subscription.subscription.ends_at.format("%Y-%m-%d").to_string(),
            Some(&card),
        );
        if let Err(e) = state.mailer.send(welcome).await {
            error!(subscription_id = %subscription.subscription.guid, "Failed to send welcome email: {}", e);
        }
    }
}
