//! Scraped fixtures, results and league tables

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{optional_text, parse_id};
use crate::db::{
    self,
    fixtures::{Fixture, FixtureFilter, FixtureWindow, Standing},
};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FixturesQuery {
    pub competition: Option<String>,
    pub season: Option<String>,
    pub team: Option<String>,
    /// `upcoming` or `results`; all fixtures when absent
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StandingsQuery {
    pub competition: Option<String>,
    pub season: Option<String>,
}

fn parse_window(raw: Option<String>) -> ApiResult<Option<FixtureWindow>> {
    match optional_text(raw).as_deref() {
        None | Some("all") => Ok(None),
        Some("upcoming") => Ok(Some(FixtureWindow::Upcoming)),
        Some("results") => Ok(Some(FixtureWindow::Results)),
        Some(other) => Err(ApiError::bad_request(format!(
            "Unknown fixture status filter: {} (expected upcoming or results)",
            other
        ))),
    }
}

/// GET /api/fixtures
pub async fn list_fixtures(
    State(state): State<AppState>,
    Query(query): Query<FixturesQuery>,
) -> ApiResult<Json<Vec<Fixture>>> {
    let filter = FixtureFilter {
        window: parse_window(query.status)?,
        competition: optional_text(query.competition),
        season: optional_text(query.season),
        team: optional_text(query.team),
    };

    Ok(Json(db::fixtures::list_fixtures(&state.db, &filter, Utc::now()).await?))
}

/// GET /api/fixtures/:id
pub async fn get_fixture(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Fixture>> {
    let id = parse_id(&id)?;
    let fixture = db::fixtures::find_fixture(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Fixture"))?;
    Ok(Json(fixture))
}

/// GET /api/standings
pub async fn list_standings(
    State(state): State<AppState>,
    Query(query): Query<StandingsQuery>,
) -> ApiResult<Json<Vec<Standing>>> {
    let competition = optional_text(query.competition);
    let season = optional_text(query.season);
    Ok(Json(
        db::fixtures::list_standings(&state.db, competition.as_deref(), season.as_deref()).await?,
    ))
}

pub fn fixture_routes() -> Router<AppState> {
    Router::new()
        .route("/api/fixtures", get(list_fixtures))
        .route("/api/fixtures/:id", get(get_fixture))
        .route("/api/standings", get(list_standings))
}
