//! Team Resolver: normalizes free-form team names to a canonical key and
//! resolves them to stored `Team` rows within a league scope, creating one
//! on explicit request.

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};

use crate::db;
use crate::domain::Team;

const STRIP_SUFFIXES: &[&str] = &[
    "football club",
    "fc",
    "sc",
    "cf",
    "bc",
    "ac",
    "united",
    "city",
];

/// Lowercases, strips trailing club-type suffixes, collapses whitespace, and
/// removes punctuation other than spaces/hyphens.
pub fn normalize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let cleaned: String = lower
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();

    while let Some(last) = tokens.last() {
        if STRIP_SUFFIXES.contains(last) {
            tokens.pop();
        } else {
            break;
        }
    }

    tokens.join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    Fuzzy(f64),
}

#[derive(Debug, Clone)]
pub struct ResolvedTeam {
    pub team: Team,
    pub match_kind: MatchKind,
}

/// Resolves `name` to a stored team, optionally scoped to `league_id`.
/// Exact canonical/alternative-name matches win; if none exist, falls back
/// to fuzzy (Jaro-Winkler) matching at >= 0.7 similarity. League-scoped
/// matches are preferred over cross-league ones; ties prefer the most
/// recently created team (highest id).
pub fn resolve(
    conn: &rusqlite::Connection,
    name: &str,
    league_id: Option<i64>,
) -> Result<Option<ResolvedTeam>> {
    let key = normalize(name);
    if key.is_empty() {
        return Ok(None);
    }

    let candidates = load_candidates(conn, league_id)?;

    // Exact match over canonical_name or any alternative_name.
    let mut exact: Vec<&Team> = candidates
        .iter()
        .filter(|t| t.canonical_name == key || t.alternative_names.iter().any(|a| a == &key))
        .collect();
    if !exact.is_empty() {
        exact.sort_by_key(|t| std::cmp::Reverse(t.id));
        return Ok(Some(ResolvedTeam {
            team: exact[0].clone(),
            match_kind: MatchKind::Exact,
        }));
    }

    // Fuzzy fallback.
    let mut best: Option<(f64, &Team)> = None;
    for team in &candidates {
        let score = jaro_winkler(&key, &team.canonical_name);
        if score >= 0.7 && best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, team));
        }
    }

    Ok(best.map(|(score, team)| ResolvedTeam {
        team: team.clone(),
        match_kind: MatchKind::Fuzzy(score),
    }))
}

/// Upserts a team with default strengths; a unique-constraint conflict on
/// (canonical_name, league_id) is treated as success (concurrent creators
/// are safe), returning the existing row.
pub fn create_if_not_exists(
    conn: &rusqlite::Connection,
    name: &str,
    league_id: i64,
) -> Result<Team> {
    let canonical = normalize(name);
    conn.execute(
        "INSERT INTO teams (league_id, name, canonical_name, alternative_names, attack_rating, defense_rating, home_bias)
         VALUES (?1, ?2, ?3, '[]', 1.0, 1.0, 0.0)
         ON CONFLICT(canonical_name, league_id) DO UPDATE SET name = teams.name",
        params![league_id, name, canonical],
    )
    .context("upsert team")?;

    let team = conn
        .query_row(
            "SELECT id, league_id, name, canonical_name, alternative_names, attack_rating, defense_rating, home_bias, last_trained_at
             FROM teams WHERE canonical_name = ?1 AND league_id = ?2",
            params![canonical, league_id],
            row_to_team,
        )
        .context("load created team")?;
    Ok(team)
}

pub fn get_by_id(conn: &rusqlite::Connection, team_id: i64) -> Result<Option<Team>> {
    conn.query_row(
        "SELECT id, league_id, name, canonical_name, alternative_names, attack_rating, defense_rating, home_bias, last_trained_at
         FROM teams WHERE id = ?1",
        params![team_id],
        row_to_team,
    )
    .optional()
    .context("load team by id")
}

fn load_candidates(conn: &rusqlite::Connection, league_id: Option<i64>) -> Result<Vec<Team>> {
    let mut stmt = if league_id.is_some() {
        conn.prepare(
            "SELECT id, league_id, name, canonical_name, alternative_names, attack_rating, defense_rating, home_bias, last_trained_at
             FROM teams WHERE league_id = ?1",
        )?
    } else {
        conn.prepare(
            "SELECT id, league_id, name, canonical_name, alternative_names, attack_rating, defense_rating, home_bias, last_trained_at
             FROM teams",
        )?
    };

    let rows = if let Some(lid) = league_id {
        stmt.query_map(params![lid], row_to_team)?
    } else {
        stmt.query_map([], row_to_team)?
    };

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode team row")?);
    }
    Ok(out)
}

fn row_to_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    let alt_json: String = row.get(4)?;
    let alternative_names: Vec<String> = serde_json::from_str(&alt_json).unwrap_or_default();
    Ok(Team {
        id: row.get(0)?,
        league_id: row.get(1)?,
        name: row.get(2)?,
        canonical_name: row.get(3)?,
        alternative_names,
        attack_rating: row.get(5)?,
        defense_rating: row.get(6)?,
        home_bias: row.get(7)?,
        last_trained_at: row.get(8)?,
    })
}

/// Jaro-Winkler similarity in [0, 1], hand-rolled rather than pulling in a
/// string-similarity crate.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    let jaro = jaro_similarity(a, b);
    if jaro < 0.7 {
        return jaro;
    }
    let prefix_len = a
        .chars()
        .zip(b.chars())
        .take(4)
        .take_while(|(x, y)| x == y)
        .count() as f64;
    jaro + prefix_len * 0.1 * (1.0 - jaro)
}

fn jaro_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let match_distance = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matches = vec![false; a.len()];
    let mut b_matches = vec![false; b.len()];
    let mut matches = 0usize;

    for i in 0..a.len() {
        let lo = i.saturating_sub(match_distance);
        let hi = (i + match_distance + 1).min(b.len());
        for j in lo..hi {
            if b_matches[j] || a[i] != b[j] {
                continue;
            }
            a_matches[i] = true;
            b_matches[j] = true;
            matches += 1;
            break;
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0usize;
    for i in 0..a.len() {
        if !a_matches[i] {
            continue;
        }
        while !b_matches[k] {
            k += 1;
        }
        if a[i] != b[k] {
            transpositions += 1;
        }
        k += 1;
    }

    let m = matches as f64;
    (m / a.len() as f64 + m / b.len() as f64 + (m - (transpositions as f64 / 2.0)) / m) / 3.0
}

pub fn open_for(conn_path: &std::path::Path) -> Result<rusqlite::Connection> {
    db::open_db(conn_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_suffixes_and_punctuation() {
        assert_eq!(normalize("Manchester United FC"), "manchester");
        assert_eq!(normalize("  Leeds   United "), "leeds");
        assert_eq!(normalize("St. Pauli!!"), "st pauli");
    }

    #[test]
    fn jaro_winkler_identical_strings_is_one() {
        assert!((jaro_winkler("arsenal", "arsenal") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jaro_winkler_similar_strings_above_threshold() {
        assert!(jaro_winkler("tottenham", "totenham") >= 0.7);
    }

    #[test]
    fn resolve_and_create_roundtrip() {
        let conn = db::open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO leagues (code, name) VALUES ('EPL', 'Premier League')",
            [],
        )
        .unwrap();
        let league_id = conn.last_insert_rowid();

        let created = create_if_not_exists(&conn, "Arsenal FC", league_id).unwrap();
        assert_eq!(created.canonical_name, "arsenal");

        let resolved = resolve(&conn, "arsenal", Some(league_id)).unwrap().unwrap();
        assert_eq!(resolved.team.id, created.id);
        assert_eq!(resolved.match_kind, MatchKind::Exact);

        // Idempotent creation.
        let again = create_if_not_exists(&conn, "Arsenal", league_id).unwrap();
        assert_eq!(again.id, created.id);
    }

    #[test]
    fn resolve_missing_team_is_none() {
        let conn = db::open_in_memory().unwrap();
        assert!(resolve(&conn, "Nonexistent FC", None).unwrap().is_none());
    }
}
