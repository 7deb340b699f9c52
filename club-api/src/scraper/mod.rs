//! Fixtures and standings scraper for the national federation site
//!
//! One pass fetches the fixtures page, optionally each match detail page,
//! then the standings page, one request at a time. Every parsed row is
//! upserted; failures of individual pages are collected into the report
//! instead of aborting the pass.

pub mod fingerprint;
pub mod parse;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::db::{self, LAST_SCRAPE_SETTING};
use crate::error::ApiError;

pub use fingerprint::fixture_fingerprint;

const USER_AGENT: &str = concat!("club-api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid selector {0}")]
    Selector(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] club_common::Error),
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::Database(e) => ApiError::Database(e),
            ScrapeError::Common(e) => ApiError::Common(e),
            ScrapeError::Selector(msg) => ApiError::Internal(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

/// Per-run overrides of the configured pages
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub fixtures_path: Option<String>,
    pub standings_path: Option<String>,
    pub include_details: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeReport {
    pub fixtures_upserted: usize,
    pub standings_upserted: usize,
    pub errors: Vec<String>,
    /// Time of the most recent pass that finished without errors
    pub last_scrape_at: Option<String>,
}

pub struct LffScraper {
    http_client: reqwest::Client,
    config: ScraperConfig,
}

impl LffScraper {
    pub fn new(config: ScraperConfig) -> Result<Self, ScrapeError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Network {
                url: config.base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { http_client, config })
    }

    fn page_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        debug!(url = %url, "Fetching page");
        let network = |e: reqwest::Error| ScrapeError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.http_client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(network)
    }

    /// Run one pass and record it in `pool`
    pub async fn run(&self, pool: &SqlitePool, options: &ScrapeOptions) -> Result<ScrapeReport, ScrapeError> {
        let fixtures_url = self.page_url(options.fixtures_path.as_deref().unwrap_or(&self.config.fixtures_path));
        let standings_url = self.page_url(options.standings_path.as_deref().unwrap_or(&self.config.standings_path));
        let include_details = options.include_details.unwrap_or(self.config.include_details);
        let competition = self.config.competition.as_str();
        let season = self.config.season.as_str();

        let mut report = ScrapeReport::default();
        let now = Utc::now();

        match self.fetch(&fixtures_url).await {
            Ok(html) => {
                let fixtures = parse::parse_fixtures(&html, &fixtures_url, competition, season)?;
                for mut fixture in fixtures {
                    if include_details {
                        if let Some(detail_url) = fixture.source_url.clone() {
                            match self.fetch(&detail_url).await {
                                Ok(detail) => fixture.stats = parse::parse_match_stats(&detail)?,
                                Err(e) => {
                                    warn!(error = %e, "Skipping match statistics");
                                    report.errors.push(e.to_string());
                                }
                            }
                        }
                    }

                    let fingerprint = fixture_fingerprint(&fixture);
                    db::fixtures::upsert_fixture(pool, &fingerprint, &fixture, now).await?;
                    report.fixtures_upserted += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, "Fixtures page unavailable");
                report.errors.push(e.to_string());
            }
        }

        match self.fetch(&standings_url).await {
            Ok(html) => {
                for standing in parse::parse_standings(&html, competition, season)? {
                    db::fixtures::upsert_standing(pool, &standing, now).await?;
                    report.standings_upserted += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, "Standings page unavailable");
                report.errors.push(e.to_string());
            }
        }

        if report.errors.is_empty() {
            let stamp = club_common::time::format_timestamp(now);
            club_common::db::settings::set_setting(pool, LAST_SCRAPE_SETTING, &stamp).await?;
            report.last_scrape_at = Some(stamp);
        }

        info!(
            fixtures = report.fixtures_upserted,
            standings = report.standings_upserted,
            errors = report.errors.len(),
            "Scrape pass finished"
        );
        Ok(report)
    }
}
