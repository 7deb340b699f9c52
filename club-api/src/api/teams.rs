//! Teams and squad roster

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::api::{optional_text, parse_id, ApiJson};
use crate::auth::AdminUser;
use crate::db::{
    self,
    teams::{Player, Team, TeamWithPlayers},
};
use crate::error::{require_text, ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TeamInput {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub logo_url: Option<String>,
    pub is_club_team: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PlayerInput {
    pub team_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub shirt_number: Option<i64>,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub birth_date: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlayersQuery {
    pub team_id: Option<String>,
}

fn check_shirt_number(number: Option<i64>) -> ApiResult<Option<i64>> {
    match number {
        Some(n) if !(1..=99).contains(&n) => Err(ApiError::bad_request("shirt_number must be between 1 and 99")),
        other => Ok(other),
    }
}

fn check_birth_date(value: Option<String>) -> ApiResult<Option<String>> {
    match optional_text(value) {
        Some(raw) => chrono::NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(|d| Some(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| ApiError::bad_request(format!("Invalid birth_date (expected YYYY-MM-DD): {}", raw))),
        None => Ok(None),
    }
}

async fn require_team(state: &AppState, team_id: Option<String>) -> ApiResult<Option<String>> {
    match optional_text(team_id) {
        Some(id) => {
            let id = parse_id(&id)?;
            if db::teams::find_team(&state.db, &id).await?.is_none() {
                return Err(ApiError::not_found("Team"));
            }
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

/// GET /api/teams
pub async fn list_teams(State(state): State<AppState>) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(db::teams::list_teams(&state.db).await?))
}

/// GET /api/teams/:id
pub async fn get_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TeamWithPlayers>> {
    let id = parse_id(&id)?;
    let team = db::teams::find_team(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team"))?;
    let players = db::teams::list_players(&state.db, Some(&id)).await?;
    Ok(Json(TeamWithPlayers { team, players }))
}

/// GET /api/players?team_id=
pub async fn list_players(
    State(state): State<AppState>,
    Query(query): Query<PlayersQuery>,
) -> ApiResult<Json<Vec<Player>>> {
    let team_id = match optional_text(query.team_id) {
        Some(id) => Some(parse_id(&id)?),
        None => None,
    };
    Ok(Json(db::teams::list_players(&state.db, team_id.as_deref()).await?))
}

/// POST /api/admin/teams
pub async fn create_team(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<TeamInput>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    let team = Team {
        guid: club_common::ids::generate(),
        name: require_text(input.name.as_deref(), "name")?,
        short_name: optional_text(input.short_name),
        logo_url: optional_text(input.logo_url),
        is_club_team: input.is_club_team.unwrap_or(false),
        created_at: Utc::now(),
    };

    match db::teams::insert_team(&state.db, &team).await {
        Ok(()) => Ok((StatusCode::CREATED, Json(team))),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ApiError::BadRequest {
            message: "A team with this name already exists".to_string(),
            details: Some(json!({ "name": team.name })),
        }),
        Err(e) => Err(e.into()),
    }
}

/// POST /api/admin/players
pub async fn create_player(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<PlayerInput>,
) -> ApiResult<(StatusCode, Json<Player>)> {
    let now = Utc::now();
    let player = Player {
        guid: club_common::ids::generate(),
        first_name: require_text(input.first_name.as_deref(), "first_name")?,
        last_name: require_text(input.last_name.as_deref(), "last_name")?,
        team_id: require_team(&state, input.team_id).await?,
        shirt_number: check_shirt_number(input.shirt_number)?,
        position: optional_text(input.position),
        nationality: optional_text(input.nationality),
        birth_date: check_birth_date(input.birth_date)?,
        photo_url: optional_text(input.photo_url),
        created_at: now,
        updated_at: now,
    };

    db::teams::insert_player(&state.db, &player).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// PUT /api/admin/players/:id
pub async fn update_player(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<PlayerInput>,
) -> ApiResult<Json<Player>> {
    let id = parse_id(&id)?;
    let mut player = db::teams::find_player(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Player"))?;

    if input.team_id.is_some() {
        player.team_id = require_team(&state, input.team_id).await?;
    }
    if input.first_name.is_some() {
        player.first_name = require_text(input.first_name.as_deref(), "first_name")?;
    }
    if input.last_name.is_some() {
        player.last_name = require_text(input.last_name.as_deref(), "last_name")?;
    }
    if input.shirt_number.is_some() {
        player.shirt_number = check_shirt_number(input.shirt_number)?;
    }
    if input.position.is_some() {
        player.position = optional_text(input.position);
    }
    if input.nationality.is_some() {
        player.nationality = optional_text(input.nationality);
    }
    if input.birth_date.is_some() {
        player.birth_date = check_birth_date(input.birth_date)?;
    }
    if input.photo_url.is_some() {
        player.photo_url = optional_text(input.photo_url);
    }
    player.updated_at = Utc::now();

    db::teams::update_player(&state.db, &player).await?;
    Ok(Json(player))
}

/// DELETE /api/admin/players/:id
pub async fn delete_player(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    if db::teams::delete_player(&state.db, &id).await? == 0 {
        return Err(ApiError::not_found("Player"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/api/teams", get(list_teams))
        .route("/api/teams/:id", get(get_team))
        .route("/api/players", get(list_players))
        .route("/api/admin/teams", post(create_team))
        .route("/api/admin/players", post(create_player))
        .route("/api/admin/players/:id", put(update_player).delete(delete_player))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shirt_number_bounds() {
        assert!(check_shirt_number(None).is_ok());
        assert_eq!(check_shirt_number(Some(10)).ok(), Some(Some(10)));
        assert!(check_shirt_number(Some(0)).is_err());
        assert!(check_shirt_number(Some(100)).is_err());
    }

    #[test]
    fn test_birth_date_normalized() {
        assert_eq!(
            check_birth_date(Some(" 1999-04-07 ".to_string())).ok(),
            Some(Some("1999-04-07".to_string()))
        );
        assert!(check_birth_date(Some("07/04/1999".to_string())).is_err());
        assert_eq!(check_birth_date(Some("  ".to_string())).ok(), Some(None));
    }
}
