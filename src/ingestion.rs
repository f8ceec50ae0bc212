//! Ingestion Adapter: downloads/parses league-season CSV match files
//! tolerantly and upserts them into the match store, one transaction per
//! file, preserving provenance fields across re-ingests.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};

use crate::error::{EngineError, Warning};
use crate::http_client;
use crate::team_resolver;

/// Downloads one league-season CSV from an upstream URL. Non-2xx and
/// network errors surface as `UpstreamUnavailable`/`RateLimited` so the
/// automated pipeline can retry or degrade rather than aborting outright.
pub fn fetch_csv(url: &str, timeout: std::time::Duration) -> Result<Vec<u8>> {
    let client = http_client::http_client()?;
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .map_err(EngineError::from)?;

    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(EngineError::RateLimited { retry_after_secs }.into());
    }
    if !response.status().is_success() {
        return Err(EngineError::UpstreamUnavailable(format!(
            "{url} returned {}",
            response.status()
        ))
        .into());
    }

    Ok(response.bytes().map_err(EngineError::from)?.to_vec())
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub warnings: Vec<Warning>,
}

/// Case-insensitive column alias map. The required logical columns are
/// {date, home_team, away_team, home_goals, away_goals}; the rest are
/// optional.
fn column_aliases() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("date", &["date", "match_date", "matchdate"] as &[&str]),
        (
            "home_team",
            &["hometeam", "home_team", "home", "team_h"] as &[&str],
        ),
        (
            "away_team",
            &["awayteam", "away_team", "away", "team_a"] as &[&str],
        ),
        (
            "home_goals",
            &["fthg", "home_goals", "homegoals", "hg"] as &[&str],
        ),
        (
            "away_goals",
            &["ftag", "away_goals", "awaygoals", "ag"] as &[&str],
        ),
        ("ht_home_goals", &["hthg", "ht_home_goals"] as &[&str]),
        ("ht_away_goals", &["htag", "ht_away_goals"] as &[&str]),
        (
            "odds_home",
            &["b365h", "odds_home", "oddshome", "avgh"] as &[&str],
        ),
        (
            "odds_draw",
            &["b365d", "odds_draw", "oddsdraw", "avgd"] as &[&str],
        ),
        (
            "odds_away",
            &["b365a", "odds_away", "oddsaway", "avga"] as &[&str],
        ),
    ])
}

const REQUIRED_COLUMNS: &[&str] = &["date", "home_team", "away_team", "home_goals", "away_goals"];

const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y", "%d/%m/%y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y", "%m/%d/%Y", "%Y/%m/%d",
];

/// Decodes bytes: declared encoding first, else a
/// latin-1/windows-1252/iso-8859-1/utf-8 cascade, with a lossy utf-8 decode
/// as the final fallback.
pub fn decode_bytes(bytes: &[u8], declared_encoding: Option<&str>) -> String {
    if let Some(label) = declared_encoding
        && let Some(enc) = encoding_rs::Encoding::for_label(label.as_bytes())
    {
        let (text, _, had_errors) = enc.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }
    for label in ["windows-1252", "iso-8859-1", "utf-8"] {
        if let Some(enc) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (text, _, had_errors) = enc.decode(bytes);
            if !had_errors {
                return text.into_owned();
            }
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn resolve_columns(
    headers: &csv::StringRecord,
) -> Result<HashMap<&'static str, usize>, Vec<String>> {
    let aliases = column_aliases();
    let lower_headers: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();

    let mut resolved = HashMap::new();
    for (&logical, candidates) in &aliases {
        for (idx, header) in lower_headers.iter().enumerate() {
            if candidates.contains(&header.as_str()) {
                resolved.insert(logical, idx);
                break;
            }
        }
    }

    let missing_required = REQUIRED_COLUMNS
        .iter()
        .any(|col| !resolved.contains_key(col));
    if missing_required {
        return Err(headers.iter().map(|h| h.to_string()).collect());
    }
    Ok(resolved)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            let year = date.format("%Y").to_string().parse::<i32>().unwrap_or(0);
            let current_year = chrono::Utc::now()
                .format("%Y")
                .to_string()
                .parse::<i32>()
                .unwrap_or(9999);
            if (1900..=current_year + 1).contains(&year) {
                return Some(date);
            }
        }
    }
    None
}

struct ParsedRow {
    home_team: String,
    away_team: String,
    match_date: NaiveDate,
    home_goals: i64,
    away_goals: i64,
    ht_home_goals: Option<i64>,
    ht_away_goals: Option<i64>,
    odds_home: Option<f64>,
    odds_draw: Option<f64>,
    odds_away: Option<f64>,
}

fn parse_row(
    record: &csv::StringRecord,
    cols: &HashMap<&'static str, usize>,
) -> std::result::Result<ParsedRow, String> {
    let get = |key: &str| -> Option<&str> { cols.get(key).and_then(|&i| record.get(i)) };

    let home_team = get("home_team").map(str::trim).unwrap_or_default();
    let away_team = get("away_team").map(str::trim).unwrap_or_default();
    if home_team.is_empty() || away_team.is_empty() {
        return Err("missing team name".to_string());
    }

    let match_date = get("date")
        .and_then(parse_date)
        .ok_or_else(|| "unparseable date".to_string())?;

    let home_goals = get("home_goals")
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| "unparseable home_goals".to_string())?;
    let away_goals = get("away_goals")
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| "unparseable away_goals".to_string())?;
    if home_goals < 0 || away_goals < 0 {
        return Err("negative goals".to_string());
    }

    Ok(ParsedRow {
        home_team: home_team.to_string(),
        away_team: away_team.to_string(),
        match_date,
        home_goals,
        away_goals,
        ht_home_goals: get("ht_home_goals").and_then(|s| s.trim().parse::<i64>().ok()),
        ht_away_goals: get("ht_away_goals").and_then(|s| s.trim().parse::<i64>().ok()),
        odds_home: get("odds_home").and_then(|s| s.trim().parse::<f64>().ok()),
        odds_draw: get("odds_draw").and_then(|s| s.trim().parse::<f64>().ok()),
        odds_away: get("odds_away").and_then(|s| s.trim().parse::<f64>().ok()),
    })
}

/// Ingests one CSV file's bytes into `league_id`. `allow_create_teams`
/// corresponds to: ingestion never silently invents teams unless the
/// caller has explicitly requested it.
pub fn ingest_csv(
    conn: &mut rusqlite::Connection,
    league_id: i64,
    bytes: &[u8],
    declared_encoding: Option<&str>,
    source_file: Option<&str>,
    ingestion_batch_id: &str,
    allow_create_teams: bool,
) -> Result<IngestSummary> {
    let text = decode_bytes(bytes, declared_encoding);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("read csv headers")?.clone();
    let cols =
        resolve_columns(&headers).map_err(|available| EngineError::SchemaMismatch { available })?;

    let mut summary = IngestSummary::default();
    let tx = conn.transaction().context("begin ingest transaction")?;

    for (row_idx, record) in reader.records().enumerate() {
        summary.processed += 1;
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                summary.skipped += 1;
                push_skip_warning(&mut summary, row_idx, err.to_string());
                continue;
            }
        };

        let parsed = match parse_row(&record, &cols) {
            Ok(p) => p,
            Err(reason) => {
                summary.skipped += 1;
                push_skip_warning(&mut summary, row_idx, reason);
                continue;
            }
        };

        let home_team =
            match resolve_or_create_team(&tx, &parsed.home_team, league_id, allow_create_teams) {
                Some(id) => id,
                None => {
                    summary.skipped += 1;
                    push_skip_warning(
                        &mut summary,
                        row_idx,
                        format!("unresolved home team {}", parsed.home_team),
                    );
                    continue;
                }
            };
        let away_team =
            match resolve_or_create_team(&tx, &parsed.away_team, league_id, allow_create_teams) {
                Some(id) => id,
                None => {
                    summary.skipped += 1;
                    push_skip_warning(
                        &mut summary,
                        row_idx,
                        format!("unresolved away team {}", parsed.away_team),
                    );
                    continue;
                }
            };

        let date_str = parsed.match_date.format("%Y-%m-%d").to_string();
        let existed = row_exists(&tx, home_team, away_team, &date_str)?;
        upsert_match(
            &tx,
            league_id,
            home_team,
            away_team,
            &date_str,
            &parsed,
            source_file,
            ingestion_batch_id,
        )?;
        if existed {
            summary.updated += 1;
        } else {
            summary.inserted += 1;
        }
    }

    tx.commit().context("commit ingest transaction")?;
    Ok(summary)
}

fn push_skip_warning(summary: &mut IngestSummary, row: usize, reason: String) {
    if summary.warnings.len() < 5 {
        summary.warnings.push(Warning::ParseSkip { row, reason });
    }
}

fn resolve_or_create_team(
    conn: &rusqlite::Connection,
    name: &str,
    league_id: i64,
    allow_create: bool,
) -> Option<i64> {
    if let Ok(Some(resolved)) = team_resolver::resolve(conn, name, Some(league_id)) {
        return Some(resolved.team.id);
    }
    if allow_create && let Ok(team) = team_resolver::create_if_not_exists(conn, name, league_id) {
        return Some(team.id);
    }
    None
}

fn row_exists(
    conn: &rusqlite::Connection,
    home_team_id: i64,
    away_team_id: i64,
    match_date: &str,
) -> Result<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM matches WHERE home_team_id = ?1 AND away_team_id = ?2 AND match_date = ?3",
            params![home_team_id, away_team_id, match_date],
            |r| r.get(0),
        )
        .optional()
        .context("check existing match")?;
    Ok(exists.is_some())
}

#[allow(clippy::too_many_arguments)]
fn upsert_match(
    conn: &rusqlite::Connection,
    league_id: i64,
    home_team_id: i64,
    away_team_id: i64,
    match_date: &str,
    parsed: &ParsedRow,
    source_file: Option<&str>,
    ingestion_batch_id: &str,
) -> Result<()> {
    // Refresh odds/scores on conflict, but never overwrite
    // source_file/ingestion_batch_id unless previously null.
    conn.execute(
        r#"
        INSERT INTO matches (
            league_id, home_team_id, away_team_id, match_date,
            home_goals, away_goals, ht_home_goals, ht_away_goals,
            odds_home, odds_draw, odds_away, source_file, ingestion_batch_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(home_team_id, away_team_id, match_date) DO UPDATE SET
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            ht_home_goals = excluded.ht_home_goals,
            ht_away_goals = excluded.ht_away_goals,
            odds_home = excluded.odds_home,
            odds_draw = excluded.odds_draw,
            odds_away = excluded.odds_away,
            source_file = COALESCE(matches.source_file, excluded.source_file),
            ingestion_batch_id = COALESCE(matches.ingestion_batch_id, excluded.ingestion_batch_id)
        "#,
        params![
            league_id,
            home_team_id,
            away_team_id,
            match_date,
            parsed.home_goals,
            parsed.away_goals,
            parsed.ht_home_goals,
            parsed.ht_away_goals,
            parsed.odds_home,
            parsed.odds_draw,
            parsed.odds_away,
            source_file,
            ingestion_batch_id,
        ],
    )
    .context("upsert match")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_league(conn: &rusqlite::Connection) -> i64 {
        conn.execute(
            "INSERT INTO leagues (code, name) VALUES ('EPL', 'Premier League')",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    const CSV_BODY: &str = "Date,HomeTeam,AwayTeam,FTHG,FTAG,B365H,B365D,B365A\n\
01/08/2023,Arsenal,Chelsea,2,1,1.8,3.6,4.2\n\
bad-date,Arsenal,Chelsea,2,1,1.8,3.6,4.2\n\
2023-08-05,Chelsea,Arsenal,,1,1.8,3.6,4.2\n";

    #[test]
    fn ingest_is_tolerant_and_idempotent() {
        let mut conn = db::open_in_memory().unwrap();
        let league_id = setup_league(&conn);

        let summary = ingest_csv(
            &mut conn,
            league_id,
            CSV_BODY.as_bytes(),
            None,
            Some("e0.csv"),
            "batch-1",
            true,
        )
        .unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped, 2);

        let again = ingest_csv(
            &mut conn,
            league_id,
            CSV_BODY.as_bytes(),
            None,
            Some("e0.csv"),
            "batch-2",
            true,
        )
        .unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.updated, 1);
    }

    #[test]
    fn schema_mismatch_reports_available_headers() {
        let mut conn = db::open_in_memory().unwrap();
        let league_id = setup_league(&conn);
        let bad = "foo,bar\n1,2\n";
        let err =
            ingest_csv(&mut conn, league_id, bad.as_bytes(), None, None, "b", true).unwrap_err();
        assert!(err.to_string().contains("missing columns"));
    }

    #[test]
    fn never_creates_teams_when_not_allowed() {
        let mut conn = db::open_in_memory().unwrap();
        let league_id = setup_league(&conn);
        let summary = ingest_csv(
            &mut conn,
            league_id,
            CSV_BODY.as_bytes(),
            None,
            None,
            "batch-1",
            false,
        )
        .unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.skipped, 3);
    }

    #[test]
    fn decode_bytes_handles_latin1() {
        let latin1_bytes = [b'C', b'a', b'f', 0xE9]; // "Café" in latin-1
        let decoded = decode_bytes(&latin1_bytes, Some("latin1"));
        assert_eq!(decoded, "Café");
    }
}
