//! Teams and squad players

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Team {
    #[serde(rename = "id")]
    pub guid: String,
    pub name: String,
    pub short_name: Option<String>,
    pub logo_url: Option<String>,
    pub is_club_team: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Player {
    #[serde(rename = "id")]
    pub guid: String,
    pub team_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub shirt_number: Option<i64>,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub birth_date: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamWithPlayers {
    #[serde(flatten)]
    pub team: Team,
    pub players: Vec<Player>,
}

pub async fn insert_team(pool: &SqlitePool, team: &Team) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO teams (guid, name, short_name, logo_url, is_club_team, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&team.guid)
    .bind(&team.name)
    .bind(&team.short_name)
    .bind(&team.logo_url)
    .bind(team.is_club_team)
    .bind(team.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_team(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Team>> {
    sqlx::query_as("SELECT * FROM teams WHERE guid = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Club teams first, then alphabetical
pub async fn list_teams(pool: &SqlitePool) -> sqlx::Result<Vec<Team>> {
    sqlx::query_as("SELECT * FROM teams ORDER BY is_club_team DESC, name ASC")
        .fetch_all(pool)
        .await
}

pub async fn insert_player(pool: &SqlitePool, player: &Player) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO players (guid, team_id, first_name, last_name, shirt_number, position,
                             nationality, birth_date, photo_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&player.guid)
    .bind(&player.team_id)
    .bind(&player.first_name)
    .bind(&player.last_name)
    .bind(player.shirt_number)
    .bind(&player.position)
    .bind(&player.nationality)
    .bind(&player.birth_date)
    .bind(&player.photo_url)
    .bind(player.created_at)
    .bind(player.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_player(pool: &SqlitePool, player: &Player) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE players SET team_id = ?, first_name = ?, last_name = ?, shirt_number = ?, position = ?,
                           nationality = ?, birth_date = ?, photo_url = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&player.team_id)
    .bind(&player.first_name)
    .bind(&player.last_name)
    .bind(player.shirt_number)
    .bind(&player.position)
    .bind(&player.nationality)
    .bind(&player.birth_date)
    .bind(&player.photo_url)
    .bind(player.updated_at)
    .bind(&player.guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn find_player(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Player>> {
    sqlx::query_as("SELECT * FROM players WHERE guid = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_player(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM players WHERE guid = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Players ordered by shirt number (unnumbered last), optionally for one team
pub async fn list_players(pool: &SqlitePool, team_id: Option<&str>) -> sqlx::Result<Vec<Player>> {
    match team_id {
        Some(team_id) => {
            sqlx::query_as(
                "SELECT * FROM players WHERE team_id = ? ORDER BY shirt_number IS NULL, shirt_number, last_name",
            )
            .bind(team_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as("SELECT * FROM players ORDER BY shirt_number IS NULL, shirt_number, last_name")
                .fetch_all(pool)
                .await
        }
    }
}
