//! club-api library - sports club web platform backend
//!
//! Events and ticketing, club shop, memberships, checkout with hosted
//! payments, news feed, squad roster, scraped fixtures and the admin
//! dashboard, served as one JSON API over SQLite.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod pagination;
pub mod scraper;
pub mod services;

pub use error::{ApiError, ApiResult};

use config::ServerConfig;
use services::{email::Mailer, payments::PaymentGateway, pdf::PdfRenderer, storage::Storage};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<ServerConfig>,
    /// Hosted checkout provider
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    /// Ticket PDFs and membership cards
    pub storage: Arc<dyn Storage>,
    pub pdf: Arc<PdfRenderer>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: ServerConfig,
        payments: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        storage: Arc<dyn Storage>,
        pdf: PdfRenderer,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            payments,
            mailer,
            storage,
            pdf: Arc::new(pdf),
        }
    }

    /// Build every external service from configuration
    pub fn from_config(db: SqlitePool, config: ServerConfig) -> anyhow::Result<Self> {
        let payments: Arc<dyn PaymentGateway> = Arc::from(services::payments::from_config(&config.payments)?);
        let mailer: Arc<dyn Mailer> = Arc::from(services::email::from_config(&config.email)?);
        let storage: Arc<dyn Storage> = Arc::from(services::storage::from_config(&config.storage)?);
        let pdf = PdfRenderer::from_config(&config.pdf)?;

        Ok(Self::new(db, config, payments, mailer, storage, pdf))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::event_routes())
        .merge(api::ticket_routes())
        .merge(api::shop_routes())
        .merge(api::coupon_routes())
        .merge(api::checkout_routes())
        .merge(api::webhook_routes())
        .merge(api::subscription_routes())
        .merge(api::order_routes())
        .merge(api::post_routes())
        .merge(api::team_routes())
        .merge(api::fixture_routes())
        .merge(api::contact_routes())
        .merge(api::admin_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
