//! SQLite schema bootstrap for the persisted state layout. One
//! `init_schema` call owns every `CREATE TABLE IF NOT EXISTS` in the crate.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS leagues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            country TEXT NOT NULL DEFAULT '',
            tier INTEGER NOT NULL DEFAULT 1,
            avg_draw_rate REAL NOT NULL DEFAULT 0.26,
            home_advantage REAL NOT NULL DEFAULT 0.35,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            league_id INTEGER NOT NULL REFERENCES leagues(id),
            name TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            alternative_names TEXT NOT NULL DEFAULT '[]',
            attack_rating REAL NOT NULL DEFAULT 1.0,
            defense_rating REAL NOT NULL DEFAULT 1.0,
            home_bias REAL NOT NULL DEFAULT 0.0,
            last_trained_at TEXT NULL,
            UNIQUE(canonical_name, league_id)
        );
        CREATE INDEX IF NOT EXISTS idx_teams_league ON teams(league_id);

        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            league_id INTEGER NOT NULL REFERENCES leagues(id),
            home_team_id INTEGER NOT NULL REFERENCES teams(id),
            away_team_id INTEGER NOT NULL REFERENCES teams(id),
            match_date TEXT NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            ht_home_goals INTEGER NULL,
            ht_away_goals INTEGER NULL,
            odds_home REAL NULL,
            odds_draw REAL NULL,
            odds_away REAL NULL,
            source_file TEXT NULL,
            ingestion_batch_id TEXT NULL,
            UNIQUE(home_team_id, away_team_id, match_date)
        );
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league_id);
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date);

        CREATE TABLE IF NOT EXISTS models (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model_type TEXT NOT NULL,
            version TEXT NOT NULL,
            status TEXT NOT NULL,
            weights TEXT NOT NULL,
            temperature REAL NOT NULL DEFAULT 1.0,
            training_leagues TEXT NOT NULL DEFAULT '[]',
            training_window_years INTEGER NOT NULL DEFAULT 3,
            training_matches INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_models_type_status ON models(model_type, status);

        CREATE TABLE IF NOT EXISTS jackpots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kickoff_date TEXT NULL,
            pipeline_metadata TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS jackpot_fixtures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            jackpot_id INTEGER NOT NULL REFERENCES jackpots(id),
            match_order INTEGER NOT NULL,
            home_team_name TEXT NOT NULL,
            away_team_name TEXT NOT NULL,
            home_team_id INTEGER NULL REFERENCES teams(id),
            away_team_id INTEGER NULL REFERENCES teams(id),
            league_id INTEGER NULL REFERENCES leagues(id),
            odds_home REAL NOT NULL,
            odds_draw REAL NOT NULL,
            odds_away REAL NOT NULL,
            opening_odds_home REAL NULL,
            opening_odds_draw REAL NULL,
            opening_odds_away REAL NULL,
            kickoff_ts INTEGER NULL,
            UNIQUE(jackpot_id, match_order)
        );

        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL REFERENCES jackpot_fixtures(id),
            model_id INTEGER NULL REFERENCES models(id),
            set_key TEXT NOT NULL,
            prob_home REAL NOT NULL,
            prob_draw REAL NOT NULL,
            prob_away REAL NOT NULL,
            lambda_home REAL NOT NULL,
            lambda_away REAL NOT NULL,
            draw_structural_components TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_predictions_fixture ON predictions(fixture_id);

        CREATE TABLE IF NOT EXISTS validation_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL REFERENCES jackpot_fixtures(id),
            set_key TEXT NOT NULL,
            prob_home REAL NOT NULL,
            prob_draw REAL NOT NULL,
            prob_away REAL NOT NULL,
            actual_result TEXT NOT NULL,
            brier REAL NOT NULL,
            log_loss REAL NOT NULL,
            exported_to_training INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_validation_exported ON validation_results(exported_to_training);

        CREATE TABLE IF NOT EXISTS odds_movement (
            fixture_id INTEGER PRIMARY KEY REFERENCES jackpot_fixtures(id),
            opening_home REAL NOT NULL,
            opening_draw REAL NOT NULL,
            opening_away REAL NOT NULL,
            closing_home REAL NOT NULL,
            closing_draw REAL NOT NULL,
            closing_away REAL NOT NULL,
            delta_draw REAL NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='matches'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
