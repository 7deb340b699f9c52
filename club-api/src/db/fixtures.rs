//! Scraped fixtures and league standings
//!
//! Both tables are written only by the scraper, with "last write wins"
//! upserts keyed by the fixture fingerprint and by
//! (competition, season, team_name) respectively.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_FINISHED: &str = "finished";
pub const STATUS_POSTPONED: &str = "postponed";

/// Stats are stored as JSON text and served as an object
fn serialize_stats<S: Serializer>(stats: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    let value = stats
        .as_deref()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok());
    value.serialize(serializer)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Fixture {
    #[serde(rename = "id")]
    pub guid: String,
    #[serde(skip)]
    pub fingerprint: String,
    pub competition: String,
    pub season: String,
    pub round: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub kickoff_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub status: String,
    #[serde(serialize_with = "serialize_stats")]
    pub stats: Option<String>,
    pub source_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A fixture as read from the source site
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub competition: String,
    pub season: String,
    pub round: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub kickoff_at: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub status: String,
    pub stats: Option<serde_json::Value>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Standing {
    #[serde(skip)]
    pub guid: String,
    pub competition: String,
    pub season: String,
    pub position: i64,
    pub team_name: String,
    pub played: i64,
    pub won: i64,
    pub drawn: i64,
    pub lost: i64,
    pub goals_for: i64,
    pub goals_against: i64,
    pub points: i64,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandingRecord {
    pub competition: String,
    pub season: String,
    pub position: i64,
    pub team_name: String,
    pub played: i64,
    pub won: i64,
    pub drawn: i64,
    pub lost: i64,
    pub goals_for: i64,
    pub goals_against: i64,
    pub points: i64,
}

/// Which side of "now" to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureWindow {
    Upcoming,
    Results,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureFilter {
    pub competition: Option<String>,
    pub season: Option<String>,
    pub team: Option<String>,
    pub window: Option<FixtureWindow>,
}

/// Insert or overwrite the fixture with this fingerprint. Stats from an
/// earlier detail scrape are kept when this pass did not fetch any.
pub async fn upsert_fixture(
    pool: &SqlitePool,
    fingerprint: &str,
    record: &FixtureRecord,
    now: DateTime<Utc>,
) -> sqlx::Result<()> {
    let stats = record.stats.as_ref().map(|s| s.to_string());

    sqlx::query(
        r#"
        INSERT INTO fixtures (guid, fingerprint, competition, season, round, home_team, away_team,
                              home_score, away_score, kickoff_at, venue, status, stats, source_url,
                              scraped_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(fingerprint) DO UPDATE SET
            round = excluded.round,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            kickoff_at = excluded.kickoff_at,
            venue = excluded.venue,
            status = excluded.status,
            stats = COALESCE(excluded.stats, fixtures.stats),
            source_url = excluded.source_url,
            scraped_at = excluded.scraped_at
        "#,
    )
    .bind(club_common::ids::generate())
    .bind(fingerprint)
    .bind(&record.competition)
    .bind(&record.season)
    .bind(&record.round)
    .bind(&record.home_team)
    .bind(&record.away_team)
    .bind(record.home_score)
    .bind(record.away_score)
    .bind(record.kickoff_at)
    .bind(&record.venue)
    .bind(&record.status)
    .bind(stats)
    .bind(&record.source_url)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_fixture(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Fixture>> {
    sqlx::query_as("SELECT * FROM fixtures WHERE guid = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_fixture_by_fingerprint(pool: &SqlitePool, fingerprint: &str) -> sqlx::Result<Option<Fixture>> {
    sqlx::query_as("SELECT * FROM fixtures WHERE fingerprint = ?")
        .bind(fingerprint)
        .fetch_optional(pool)
        .await
}

/// Upcoming fixtures ascend by kickoff, everything else descends
pub async fn list_fixtures(
    pool: &SqlitePool,
    filter: &FixtureFilter,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<Fixture>> {
    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM fixtures WHERE 1 = 1");

    if let Some(competition) = &filter.competition {
        query.push(" AND competition = ").push_bind(competition.clone());
    }
    if let Some(season) = &filter.season {
        query.push(" AND season = ").push_bind(season.clone());
    }
    if let Some(team) = &filter.team {
        let pattern = format!("%{}%", team.trim());
        query
            .push(" AND (home_team LIKE ")
            .push_bind(pattern.clone())
            .push(" OR away_team LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    match filter.window {
        Some(FixtureWindow::Upcoming) => {
            query
                .push(" AND status != 'finished' AND (kickoff_at IS NULL OR kickoff_at >= ")
                .push_bind(now)
                .push(") ORDER BY kickoff_at IS NULL, kickoff_at ASC");
        }
        Some(FixtureWindow::Results) => {
            query.push(" AND status = 'finished' ORDER BY kickoff_at DESC");
        }
        None => {
            query.push(" ORDER BY kickoff_at DESC");
        }
    }

    query.build_query_as().fetch_all(pool).await
}

pub async fn upsert_standing(pool: &SqlitePool, record: &StandingRecord, now: DateTime<Utc>) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO standings (guid, competition, season, position, team_name, played, won, drawn,
                               lost, goals_for, goals_against, points, scraped_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(competition, season, team_name) DO UPDATE SET
            position = excluded.position,
            played = excluded.played,
            won = excluded.won,
            drawn = excluded.drawn,
            lost = excluded.lost,
            goals_for = excluded.goals_for,
            goals_against = excluded.goals_against,
            points = excluded.points,
            scraped_at = excluded.scraped_at
        "#,
    )
    .bind(club_common::ids::generate())
    .bind(&record.competition)
    .bind(&record.season)
    .bind(record.position)
    .bind(&record.team_name)
    .bind(record.played)
    .bind(record.won)
    .bind(record.drawn)
    .bind(record.lost)
    .bind(record.goals_for)
    .bind(record.goals_against)
    .bind(record.points)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_standings(
    pool: &SqlitePool,
    competition: Option<&str>,
    season: Option<&str>,
) -> sqlx::Result<Vec<Standing>> {
    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM standings WHERE 1 = 1");
    if let Some(competition) = competition {
        query.push(" AND competition = ").push_bind(competition.to_string());
    }
    if let Some(season) = season {
        query.push(" AND season = ").push_bind(season.to_string());
    }
    query.push(" ORDER BY competition, season, position ASC");

    query.build_query_as().fetch_all(pool).await
}
