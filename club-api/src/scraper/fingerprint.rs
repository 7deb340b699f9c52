//! Stable identity for scraped fixtures
//!
//! The source site has no fixture ids, so a fixture is identified by what it
//! is: competition, season, round and the two teams. Rescheduling a match
//! keeps its fingerprint when the round is known.

use sha2::{Digest, Sha256};

use crate::db::fixtures::FixtureRecord;

fn normalize(part: &str) -> String {
    part.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 hex of `competition|season|round|home|away`
///
/// When the round is missing the kickoff date (`YYYY-MM-DD`) takes its
/// place, and an empty string when both are missing.
pub fn fixture_fingerprint(record: &FixtureRecord) -> String {
    let round = match record.round.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(round) => round.to_string(),
        None => record
            .kickoff_at
            .map(|k| k.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    };

    let key = [
        record.competition.as_str(),
        record.season.as_str(),
        round.as_str(),
        record.home_team.as_str(),
        record.away_team.as_str(),
    ]
    .iter()
    .map(|part| normalize(part))
    .collect::<Vec<_>>()
    .join("|");

    format!("{:x}", Sha256::digest(key.as_bytes()))
}
