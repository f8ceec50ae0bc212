//! Feature Store: a key-value cache of team strength vectors keyed by
//! team id, TTL 7 days, with a database fallback. Read-through/write-through
//! over an in-process cache rather than a JSON file.
//!
//! If the cache backend is unavailable, reads fall back to the database and
//! writes become no-ops: `FeatureStore` never fails a read/write, only
//! silently degrades.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use rusqlite::params;

use crate::domain::TeamStrength;

const TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CachedEntry {
    strength: TeamStrength,
    home_bias: f64,
    model_version: String,
    cached_at: Instant,
}

pub struct FeatureStore {
    cache: Mutex<HashMap<i64, CachedEntry>>,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStore {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Write-through: call on model activation to seed the cache for every
    /// team present in the newly active Poisson model.
    pub fn put(&self, team_id: i64, strength: TeamStrength, home_bias: f64, model_version: &str) {
        let Ok(mut guard) = self.cache.lock() else {
            return;
        };
        guard.insert(
            team_id,
            CachedEntry {
                strength,
                home_bias,
                model_version: model_version.to_string(),
                cached_at: Instant::now(),
            },
        );
    }

    /// Read-through: serves from cache if present and unexpired, else reads
    /// the `teams` table and repopulates the cache.
    pub fn get(
        &self,
        conn: &rusqlite::Connection,
        team_id: i64,
    ) -> Result<Option<(TeamStrength, f64)>> {
        if let Ok(guard) = self.cache.lock()
            && let Some(entry) = guard.get(&team_id)
            && entry.cached_at.elapsed() < TTL
        {
            return Ok(Some((entry.strength.clone(), entry.home_bias)));
        }

        let row: Option<(f64, f64, f64)> = conn
            .query_row(
                "SELECT attack_rating, defense_rating, home_bias FROM teams WHERE id = ?1",
                params![team_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .ok();

        let Some((attack, defense, home_bias)) = row else {
            return Ok(None);
        };
        let strength = TeamStrength { attack, defense };
        self.put(team_id, strength.clone(), home_bias, "db-fallback");
        Ok(Some((strength, home_bias)))
    }

    pub fn invalidate(&self, team_id: i64) {
        if let Ok(mut guard) = self.cache.lock() {
            guard.remove(&team_id);
        }
    }

    /// The model version that populated `team_id`'s cached entry, if any.
    pub fn model_version(&self, team_id: i64) -> Option<String> {
        self.cache
            .lock()
            .ok()?
            .get(&team_id)
            .map(|e| e.model_version.clone())
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn read_through_falls_back_to_db() {
        let conn = db::open_in_memory().unwrap();
        conn.execute("INSERT INTO leagues (code, name) VALUES ('EPL','EPL')", [])
            .unwrap();
        let league_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO teams (league_id, name, canonical_name, attack_rating, defense_rating, home_bias)
             VALUES (?1, 'Arsenal', 'arsenal', 1.3, 0.9, 0.1)",
            params![league_id],
        )
        .unwrap();
        let team_id = conn.last_insert_rowid();

        let fs = FeatureStore::new();
        assert!(fs.is_empty());
        let (strength, home_bias) = fs.get(&conn, team_id).unwrap().unwrap();
        assert!((strength.attack - 1.3).abs() < 1e-9);
        assert!((home_bias - 0.1).abs() < 1e-9);
        assert_eq!(fs.len(), 1);
    }

    #[test]
    fn missing_team_returns_none() {
        let conn = db::open_in_memory().unwrap();
        let fs = FeatureStore::new();
        assert!(fs.get(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn put_then_get_serves_from_cache() {
        let conn = db::open_in_memory().unwrap();
        let fs = FeatureStore::new();
        fs.put(
            42,
            TeamStrength {
                attack: 2.0,
                defense: 0.5,
            },
            0.2,
            "v1",
        );
        let (strength, home_bias) = fs.get(&conn, 42).unwrap().unwrap();
        assert!((strength.attack - 2.0).abs() < 1e-9);
        assert!((home_bias - 0.2).abs() < 1e-9);
    }
}
