//! HTML parsing for the federation site
//!
//! Fixtures page: round headings (`h2`, `h3` or `.round`) followed by table
//! rows of `kickoff | home | score | away | venue`, where a link in the row
//! points at the match detail page.
//!
//! Detail page: statistics rows of `home value | label | away value`.
//!
//! Standings page: rows of `position | team | played | won | drawn | lost |
//! goals | points`, with goals either as one `for:against` cell or as two
//! cells.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};

use super::ScrapeError;
use crate::db::fixtures::{FixtureRecord, StandingRecord, STATUS_FINISHED, STATUS_POSTPONED, STATUS_SCHEDULED};

static SCORE_RE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^(\d{1,2})\s*[-:–]\s*(\d{1,2})$"));

/// Score cell of a fixture row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Played(i64, i64),
    NotPlayed,
    Postponed,
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{}: {:?}", css, e)))
}

/// Element text with whitespace runs collapsed
fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `2-1`, `2:1` and `2 – 1` are results; `-`, `vs` and blanks are not
pub fn parse_score(raw: &str) -> Score {
    let cleaned = raw.trim();
    let lowered = cleaned.to_lowercase();
    if lowered.contains("atid") || lowered.contains("postpon") {
        return Score::Postponed;
    }

    let captures = match SCORE_RE.as_ref() {
        Ok(re) => re.captures(cleaned),
        Err(_) => None,
    };
    match captures {
        Some(caps) => match (caps[1].parse(), caps[2].parse()) {
            (Ok(home), Ok(away)) => Score::Played(home, away),
            _ => Score::NotPlayed,
        },
        None => Score::NotPlayed,
    }
}

/// Kickoff in site-local notation, read as UTC
///
/// Accepts `12.04.2026 18:00`, `2026-04-12 18:00` and the bare dates.
pub fn parse_kickoff(raw: &str) -> Option<DateTime<Utc>> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    for format in ["%d.%m.%Y %H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(dt.and_utc());
        }
    }
    for format in ["%d.%m.%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Fixture rows of the fixtures page
pub fn parse_fixtures(html: &str, page_url: &str, competition: &str, season: &str) -> Result<Vec<FixtureRecord>, ScrapeError> {
    let document = Html::parse_document(html);
    let items = selector("h2, h3, .round, tr")?;
    let cell = selector("td")?;
    let link = selector("a[href]")?;
    let base = Url::parse(page_url).ok();

    let mut fixtures = Vec::new();
    let mut round: Option<String> = None;

    for element in document.select(&items) {
        if element.value().name() != "tr" {
            let heading = text_of(&element);
            round = (!heading.is_empty()).then_some(heading);
            continue;
        }

        let cells: Vec<String> = element.select(&cell).map(|c| text_of(&c)).collect();
        if cells.len() < 4 || cells[1].is_empty() || cells[3].is_empty() {
            continue;
        }

        let (home_score, away_score, status) = match parse_score(&cells[2]) {
            Score::Played(home, away) => (Some(home), Some(away), STATUS_FINISHED),
            Score::NotPlayed => (None, None, STATUS_SCHEDULED),
            Score::Postponed => (None, None, STATUS_POSTPONED),
        };

        let source_url = element
            .select(&link)
            .filter_map(|a| a.value().attr("href"))
            .next()
            .and_then(|href| match &base {
                Some(base) => base.join(href).ok().map(|u| u.to_string()),
                None => Some(href.to_string()),
            });

        fixtures.push(FixtureRecord {
            competition: competition.to_string(),
            season: season.to_string(),
            round: round.clone(),
            home_team: cells[1].clone(),
            away_team: cells[3].clone(),
            home_score,
            away_score,
            kickoff_at: parse_kickoff(&cells[0]),
            venue: cells.get(4).filter(|v| !v.is_empty()).cloned(),
            status: status.to_string(),
            stats: None,
            source_url,
        });
    }

    Ok(fixtures)
}

fn stat_value(raw: &str) -> Value {
    let trimmed = raw.trim_end_matches('%').trim();
    match trimmed.parse::<i64>() {
        Ok(n) => json!(n),
        Err(_) => json!(raw),
    }
}

/// Match statistics as `{label: {home, away}}`, `None` when the page has none
pub fn parse_match_stats(html: &str) -> Result<Option<Value>, ScrapeError> {
    let document = Html::parse_document(html);
    let rows = selector("tr")?;
    let cell = selector("td")?;

    let mut stats = Map::new();
    for row in document.select(&rows) {
        let cells: Vec<String> = row.select(&cell).map(|c| text_of(&c)).collect();
        if cells.len() != 3 || cells[1].is_empty() {
            continue;
        }
        stats.insert(
            cells[1].clone(),
            json!({ "home": stat_value(&cells[0]), "away": stat_value(&cells[2]) }),
        );
    }

    Ok((!stats.is_empty()).then_some(Value::Object(stats)))
}

fn number(raw: &str) -> Option<i64> {
    raw.trim().trim_end_matches('.').trim().parse().ok()
}

fn goals_pair(raw: &str) -> Option<(i64, i64)> {
    let (scored, conceded) = raw.split_once([':', '-'])?;
    Some((number(scored)?, number(conceded)?))
}

/// League table rows; malformed rows are skipped
pub fn parse_standings(html: &str, competition: &str, season: &str) -> Result<Vec<StandingRecord>, ScrapeError> {
    let document = Html::parse_document(html);
    let rows = selector("tr")?;
    let cell = selector("td")?;

    let mut standings = Vec::new();
    for row in document.select(&rows) {
        let cells: Vec<String> = row.select(&cell).map(|c| text_of(&c)).collect();
        if cells.len() < 8 || cells[1].is_empty() {
            continue;
        }

        let goals = match goals_pair(&cells[6]) {
            Some((gf, ga)) => Some((gf, ga, cells.get(7))),
            None => match (number(&cells[6]), cells.get(7).and_then(|c| number(c))) {
                (Some(gf), Some(ga)) => Some((gf, ga, cells.get(8))),
                _ => None,
            },
        };
        let Some((goals_for, goals_against, points_cell)) = goals else {
            continue;
        };

        let parsed = (|| {
            Some(StandingRecord {
                competition: competition.to_string(),
                season: season.to_string(),
                position: number(&cells[0])?,
                team_name: cells[1].clone(),
                played: number(&cells[2])?,
                won: number(&cells[3])?,
                drawn: number(&cells[4])?,
                lost: number(&cells[5])?,
                goals_for,
                goals_against,
                points: number(points_cell?)?,
            })
        })();

        if let Some(standing) = parsed {
            standings.push(standing);
        }
    }

    Ok(standings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FIXTURES_HTML: &str = r#"
        <html><body>
          <h2>1 turas</h2>
          <table>
            <tr><th>Data</th><th>Namai</th><th></th><th>Svečiai</th><th>Stadionas</th></tr>
            <tr>
              <td>04.03.2026 18:00</td><td>FK Žalgiris</td>
              <td><a href="/rungtynes/1001">2 : 1</a></td>
              <td>FK Sūduva</td><td>LFF stadionas</td>
            </tr>
            <tr><td>2026-03-05 19:30</td><td>FK Banga</td><td>-</td><td>FK Hegelmann</td><td></td></tr>
          </table>
          <h2>2 turas</h2>
          <table>
            <tr><td>12.03.2026</td><td>FK Sūduva</td><td>Atidėta</td><td>FK Banga</td></tr>
            <tr><td>broken row</td></tr>
          </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("2-1"), Score::Played(2, 1));
        assert_eq!(parse_score(" 0:0 "), Score::Played(0, 0));
        assert_eq!(parse_score("3 – 2"), Score::Played(3, 2));
        assert_eq!(parse_score("-"), Score::NotPlayed);
        assert_eq!(parse_score("vs"), Score::NotPlayed);
        assert_eq!(parse_score(""), Score::NotPlayed);
        assert_eq!(parse_score("Atidėta"), Score::Postponed);
    }

    #[test]
    fn test_parse_kickoff_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 4, 12, 18, 0, 0).unwrap();
        assert_eq!(parse_kickoff("12.04.2026 18:00"), Some(expected));
        assert_eq!(parse_kickoff("2026-04-12  18:00"), Some(expected));
        assert_eq!(
            parse_kickoff("12.04.2026"),
            Some(Utc.with_ymd_and_hms(2026, 4, 12, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_kickoff("rytoj"), None);
    }

    #[test]
    fn test_parse_fixtures_page() {
        let fixtures = parse_fixtures(FIXTURES_HTML, "https://www.lff.lt/rungtynes", "A Lyga", "2026").unwrap();
        assert_eq!(fixtures.len(), 3);

        let first = &fixtures[0];
        assert_eq!(first.round.as_deref(), Some("1 turas"));
        assert_eq!(first.home_team, "FK Žalgiris");
        assert_eq!(first.away_team, "FK Sūduva");
        assert_eq!((first.home_score, first.away_score), (Some(2), Some(1)));
        assert_eq!(first.status, STATUS_FINISHED);
        assert_eq!(first.venue.as_deref(), Some("LFF stadionas"));
        assert_eq!(first.source_url.as_deref(), Some("https://www.lff.lt/rungtynes/1001"));

        let second = &fixtures[1];
        assert_eq!(second.status, STATUS_SCHEDULED);
        assert_eq!(second.home_score, None);
        assert_eq!(second.venue, None);
        assert_eq!(second.source_url, None);

        let third = &fixtures[2];
        assert_eq!(third.round.as_deref(), Some("2 turas"));
        assert_eq!(third.status, STATUS_POSTPONED);
        assert_eq!(
            third.kickoff_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 12, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_match_stats() {
        let html = r#"
            <table class="stats">
              <tr><td>55%</td><td>Kamuolio kontrolė</td><td>45%</td></tr>
              <tr><td>7</td><td>Smūgiai į vartus</td><td>3</td></tr>
              <tr><td>n/a</td><td>Teisėjas</td><td>n/a</td></tr>
            </table>
        "#;
        let stats = parse_match_stats(html).unwrap().unwrap();
        assert_eq!(stats["Kamuolio kontrolė"]["home"], 55);
        assert_eq!(stats["Smūgiai į vartus"]["away"], 3);
        assert_eq!(stats["Teisėjas"]["home"], "n/a");

        assert_eq!(parse_match_stats("<p>No statistics</p>").unwrap(), None);
    }

    #[test]
    fn test_parse_standings_both_goal_layouts() {
        let html = r#"
            <table>
              <tr><th>#</th><th>Komanda</th></tr>
              <tr><td>1.</td><td>FK Žalgiris</td><td>10</td><td>8</td><td>1</td><td>1</td><td>24:6</td><td>25</td></tr>
              <tr><td>2</td><td>FK Sūduva</td><td>10</td><td>6</td><td>2</td><td>2</td><td>15</td><td>9</td><td>20</td></tr>
              <tr><td>x</td><td>Bad row</td><td>1</td><td>1</td><td>0</td><td>0</td><td>1:0</td><td>3</td></tr>
            </table>
        "#;
        let standings = parse_standings(html, "A Lyga", "2026").unwrap();
        assert_eq!(standings.len(), 2);

        assert_eq!(standings[0].position, 1);
        assert_eq!(standings[0].team_name, "FK Žalgiris");
        assert_eq!((standings[0].goals_for, standings[0].goals_against), (24, 6));
        assert_eq!(standings[0].points, 25);

        assert_eq!(standings[1].team_name, "FK Sūduva");
        assert_eq!((standings[1].goals_for, standings[1].goals_against), (15, 9));
        assert_eq!(standings[1].points, 20);
    }
}
