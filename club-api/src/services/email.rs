//! Transactional email
//!
//! `HttpMailer` talks to a Resend-style API (`POST {api_url}/emails`).
//! Without an API key the server runs with `LogMailer`, which only logs.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EmailConfig;
use crate::error::ApiError;
use crate::services::html::{escape, format_money};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email request failed: {0}")]
    Network(String),

    #[error("Email API error {0}: {1}")]
    Api(u16, String),
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// A rendered message ready to send
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Pick the mailer for this configuration
pub fn from_config(config: &EmailConfig) -> Result<Box<dyn Mailer>, MailError> {
    match &config.api_key {
        Some(key) if !key.is_empty() => Ok(Box::new(HttpMailer::new(
            config.api_url.clone(),
            key.clone(),
            config.from.clone(),
        )?)),
        _ => {
            info!("No email API key configured, outgoing mail will only be logged");
            Ok(Box::new(LogMailer))
        }
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

pub struct HttpMailer {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Result<Self, MailError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MailError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let body = SendRequest {
            from: &self.from,
            to: vec![email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            reply_to: email.reply_to.as_deref(),
        };

        let response = self
            .http_client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MailError::Api(status.as_u16(), error_text));
        }

        debug!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Email (not sent, no API key)");
        Ok(())
    }
}

// ============================================================================
// Templates
// ============================================================================

/// One purchased line as shown in the confirmation email
#[derive(Debug, Clone)]
pub struct ConfirmationLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A downloadable document (ticket PDF or membership card)
#[derive(Debug, Clone)]
pub struct DocumentLink {
    pub label: String,
    pub url: String,
}

pub struct OrderConfirmation<'a> {
    pub order_id: &'a str,
    pub customer_name: Option<&'a str>,
    pub customer_email: &'a str,
    pub lines: &'a [ConfirmationLine],
    pub discount_cents: i64,
    pub total_cents: i64,
    pub currency: &'a str,
    pub documents: &'a [DocumentLink],
}

fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>{}</title></head>
<body style="font-family: Helvetica, Arial, sans-serif; color: #111; max-width: 600px;">
{}
</body></html>"#,
        escape(title),
        content
    )
}

fn greeting(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("<p>Hi {},</p>", escape(name)),
        None => "<p>Hi,</p>".to_string(),
    }
}

pub fn order_confirmation(order: &OrderConfirmation<'_>) -> OutgoingEmail {
    let rows: String = order
        .lines
        .iter()
        .map(|line| {
            format!(
                "<tr><td>{}</td><td>{}</td><td style=\"text-align:right\">{}</td></tr>",
                escape(&line.description),
                line.quantity,
                format_money(line.unit_price_cents * line.quantity, order.currency)
            )
        })
        .collect();

    let discount = if order.discount_cents > 0 {
        format!(
            "<tr><td colspan=\"2\">Discount</td><td style=\"text-align:right\">-{}</td></tr>",
            format_money(order.discount_cents, order.currency)
        )
    } else {
        String::new()
    };

    let documents = if order.documents.is_empty() {
        String::new()
    } else {
        let links: String = order
            .documents
            .iter()
            .map(|doc| format!("<li><a href=\"{}\">{}</a></li>", escape(&doc.url), escape(&doc.label)))
            .collect();
        format!("<h3>Your documents</h3><ul>{}</ul>", links)
    };

    let content = format!(
        "{greeting}<p>Thank you for your order. Payment has been received.</p>\
         <table style=\"width:100%\">{rows}{discount}\
         <tr><th colspan=\"2\" style=\"text-align:left\">Total</th><th style=\"text-align:right\">{total}</th></tr></table>\
         {documents}<p style=\"color:#666;font-size:12px\">Order {order_id}</p>",
        greeting = greeting(order.customer_name),
        rows = rows,
        discount = discount,
        total = format_money(order.total_cents, order.currency),
        documents = documents,
        order_id = escape(order.order_id),
    );

    OutgoingEmail {
        to: order.customer_email.to_string(),
        subject: "Your order confirmation".to_string(),
        html: layout("Order confirmation", &content),
        reply_to: None,
    }
}

pub fn subscription_welcome(
    to: &str,
    name: Option<&str>,
    plan_name: &str,
    ends_at: &str,
    card: Option<&DocumentLink>,
) -> OutgoingEmail {
    let card_link = card
        .map(|c| format!("<p><a href=\"{}\">{}</a></p>", escape(&c.url), escape(&c.label)))
        .unwrap_or_default();

    let content = format!(
        "{}<p>Welcome to the club! Your <strong>{}</strong> membership is active until {}.</p>{}",
        greeting(name),
        escape(plan_name),
        escape(ends_at),
        card_link
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Welcome: {}", plan_name),
        html: layout("Membership", &content),
        reply_to: None,
    }
}

/// Contact form message forwarded to the club inbox, replying to the sender
pub fn contact_message(inbox: &str, name: &str, email: &str, message: &str) -> OutgoingEmail {
    let body = escape(message).replace('\n', "<br>");
    let content = format!(
        "<p><strong>From:</strong> {} &lt;{}&gt;</p><p>{}</p>",
        escape(name),
        escape(email),
        body
    );

    OutgoingEmail {
        to: inbox.to_string(),
        subject: format!("Contact form: {}", name),
        html: layout("Contact form", &content),
        reply_to: Some(email.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_confirmation_lists_lines_and_links() {
        let lines = vec![ConfirmationLine {
            description: "Derby <Main stand>".to_string(),
            quantity: 2,
            unit_price_cents: 1500,
        }];
        let documents = vec![DocumentLink {
            label: "Ticket 1".to_string(),
            url: "http://localhost:3000/api/tickets/t1/pdf".to_string(),
        }];

        let email = order_confirmation(&OrderConfirmation {
            order_id: "o1",
            customer_name: Some("Ona"),
            customer_email: "ona@example.com",
            lines: &lines,
            discount_cents: 300,
            total_cents: 2700,
            currency: "eur",
            documents: &documents,
        });

        assert_eq!(email.to, "ona@example.com");
        assert!(email.html.contains("Derby &lt;Main stand&gt;"));
        assert!(email.html.contains("30.00 EUR"));
        assert!(email.html.contains("-3.00 EUR"));
        assert!(email.html.contains("27.00 EUR"));
        assert!(email.html.contains("/api/tickets/t1/pdf"));
        assert!(email.html.contains("Hi Ona,"));
    }

    #[test]
    fn test_contact_message_escapes_and_sets_reply_to() {
        let email = contact_message("club@example.com", "Petras", "p@example.com", "<b>hi</b>\nthere");

        assert_eq!(email.to, "club@example.com");
        assert_eq!(email.reply_to.as_deref(), Some("p@example.com"));
        assert!(email.html.contains("&lt;b&gt;hi&lt;/b&gt;<br>there"));
    }

    #[test]
    fn test_subscription_welcome() {
        let email = subscription_welcome("a@example.com", None, "Season 2026", "2026-12-31", None);
        assert!(email.subject.contains("Season 2026"));
        assert!(email.html.contains("Hi,"));
        assert!(email.html.contains("2026-12-31"));
    }

    #[tokio::test]
    async fn test_log_mailer_succeeds() {
        let mailer = LogMailer;
        let email = contact_message("club@example.com", "A", "a@example.com", "hello");
        assert!(mailer.send(email).await.is_ok());
    }
}
