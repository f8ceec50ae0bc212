//! External interface layer: the engine's callable surface, expressed as
//! plain Rust functions and structs over an `Engine` handle rather than an
//! HTTP server, since this crate is a library/CLI engine, not a service.
//! Each method below mirrors one callable endpoint one-to-one.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::automated_pipeline::{ProgressEvent, StageRunner, TaskPool, TaskStatus};
use crate::config::EngineConfig;
use crate::correlation::{self, CorrelationWeights, FixturePairInputs};
use crate::db;
use crate::domain::{
    BlendingWeights, CalibrationWeights, DrawCalibrationWeights, HistoricalMatch, Jackpot,
    JackpotFixture, ModelType, Odds, PoissonWeights, Prediction, SetKey, TeamStrength,
    ValidationResult,
};
use crate::error::{EngineError, Result};
use crate::feature_store::FeatureStore;
use crate::late_shock::{self, ShockAssessment};
use crate::pipeline::{self, FixtureInputs, TeamInputs};
use crate::team_resolver;
use crate::ticket_generator::{self, Ticket};
use crate::training;

/// Portfolio-level diagnostics for a bundle of per-role tickets, attached
/// alongside the tickets themselves (each of which already carries its own
/// relaxation/hedge/correlation-break diagnostics).
#[derive(Debug, Clone, Default)]
pub struct BundleDiagnostics {
    pub draw_counts: Vec<usize>,
    pub entropies: Vec<f64>,
    /// `agreement_matrix[i][j]` is the fraction of fixtures where tickets
    /// `i` and `j` (in the order of the requested `set_keys`) pick the same
    /// outcome.
    pub agreement_matrix: Vec<Vec<f64>>,
    pub favorite_hedge_satisfied: bool,
    pub favorite_hedge_mutations: usize,
}

#[derive(Debug, Clone)]
pub struct TicketBundle {
    pub tickets: Vec<Ticket>,
    pub diagnostics: BundleDiagnostics,
}

pub struct Engine {
    conn: Mutex<Connection>,
    pub config: EngineConfig,
    pub feature_store: FeatureStore,
    pub tasks: TaskPool,
}

impl Engine {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_db(path)?),
            config: EngineConfig::from_env(),
            feature_store: FeatureStore::new(),
            tasks: TaskPool::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
            config: EngineConfig::from_env(),
            feature_store: FeatureStore::new(),
            tasks: TaskPool::new(),
        })
    }

    /// GET /jackpots
    pub fn list_jackpots(&self) -> Result<Vec<Jackpot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, kickoff_date FROM jackpots ORDER BY id DESC")?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, Option<String>>(1)?))
        })?;

        let mut jackpots = Vec::new();
        for row in rows {
            let (id, kickoff_date) = row?;
            jackpots.push(Jackpot {
                id,
                fixtures: self.load_fixtures(&conn, id)?,
                kickoff_date,
            });
        }
        Ok(jackpots)
    }

    fn load_fixtures(&self, conn: &Connection, jackpot_id: i64) -> Result<Vec<JackpotFixture>> {
        let mut stmt = conn.prepare(
            "SELECT match_order, home_team_name, away_team_name, home_team_id, away_team_id,
                    league_id, odds_home, odds_draw, odds_away,
                    opening_odds_home, opening_odds_draw, opening_odds_away, kickoff_ts
             FROM jackpot_fixtures WHERE jackpot_id = ?1 ORDER BY match_order",
        )?;
        let rows = stmt.query_map(params![jackpot_id], |r| {
            let opening = match (
                r.get::<_, Option<f64>>(9)?,
                r.get::<_, Option<f64>>(10)?,
                r.get::<_, Option<f64>>(11)?,
            ) {
                (Some(h), Some(d), Some(a)) => Some(Odds {
                    home: h,
                    draw: d,
                    away: a,
                }),
                _ => None,
            };
            Ok(JackpotFixture {
                match_order: r.get(0)?,
                home_team_name: r.get(1)?,
                away_team_name: r.get(2)?,
                home_team_id: r.get(3)?,
                away_team_id: r.get(4)?,
                league_id: r.get(5)?,
                odds: Odds {
                    home: r.get(6)?,
                    draw: r.get(7)?,
                    away: r.get(8)?,
                },
                opening_odds: opening,
                kickoff_ts: r.get(12)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// POST /jackpots: creates a jackpot with the given fixtures, resolving
    /// team names against the team resolver where possible (never creating
    /// teams implicitly here, matching ingestion's no-silent-creation rule).
    pub fn create_jackpot(
        &self,
        fixtures: &[JackpotFixture],
        kickoff_date: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jackpots (kickoff_date) VALUES (?1)",
            params![kickoff_date],
        )?;
        let jackpot_id = conn.last_insert_rowid();

        for f in fixtures {
            let (home_id, away_id) = match f.league_id {
                Some(league_id) => (
                    team_resolver::resolve(&conn, &f.home_team_name, Some(league_id))?
                        .map(|r| r.team.id),
                    team_resolver::resolve(&conn, &f.away_team_name, Some(league_id))?
                        .map(|r| r.team.id),
                ),
                None => (None, None),
            };
            let opening = f.opening_odds.as_ref();
            conn.execute(
                "INSERT INTO jackpot_fixtures (
                    jackpot_id, match_order, home_team_name, away_team_name,
                    home_team_id, away_team_id, league_id,
                    odds_home, odds_draw, odds_away,
                    opening_odds_home, opening_odds_draw, opening_odds_away, kickoff_ts
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
                params![
                    jackpot_id,
                    f.match_order,
                    f.home_team_name,
                    f.away_team_name,
                    home_id,
                    away_id,
                    f.league_id,
                    f.odds.home,
                    f.odds.draw,
                    f.odds.away,
                    opening.map(|o| o.home),
                    opening.map(|o| o.draw),
                    opening.map(|o| o.away),
                    f.kickoff_ts,
                ],
            )?;
        }
        Ok(jackpot_id)
    }

    /// GET /pipeline/check-status: whether a league has an active model of
    /// every required type.
    pub fn check_pipeline_status(&self, league_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        for model_type in [
            ModelType::Poisson,
            ModelType::Blending,
            ModelType::Calibration,
        ] {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM models WHERE model_type = ?1 AND status = 'active' AND training_leagues LIKE '%' || ?2 || '%'",
                    params![format!("{model_type:?}"), league_id],
                    |r| r.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// POST /pipeline/run: spawns an automated-pipeline task for `league_id`.
    pub fn run_pipeline(
        &self,
        league_id: i64,
        runner: Box<dyn StageRunner>,
    ) -> (u64, std::sync::mpsc::Receiver<ProgressEvent>) {
        self.tasks.spawn(league_id, runner)
    }

    /// GET /pipeline/status/{task_id}
    pub fn pipeline_status(&self, task_id: u64) -> Option<TaskStatus> {
        self.tasks.status(task_id)
    }

    /// POST /probabilities/compute: runs the full probability pipeline for
    /// every fixture in a jackpot against the currently active models. Each
    /// fixture's draw prior comes from its own league's stored average,
    /// since a jackpot ticket routinely spans several leagues at once.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_probabilities(
        &self,
        jackpot_id: i64,
        set_keys: &[SetKey],
        poisson: &PoissonWeights,
        blending: &BlendingWeights,
        calibration: Option<&CalibrationWeights>,
        draw_calibration: Option<&DrawCalibrationWeights>,
        temperature: f64,
    ) -> Result<Vec<Prediction>> {
        let conn = self.conn.lock().unwrap();
        let fixtures = self.load_fixtures(&conn, jackpot_id)?;

        let mut predictions = Vec::new();
        for fixture in &fixtures {
            let home = fixture
                .home_team_id
                .and_then(|id| poisson.team_strengths.get(&id).cloned())
                .map(|s| TeamInputs {
                    attack: s.attack,
                    defense: s.defense,
                    used_fallback: false,
                })
                .unwrap_or_else(TeamInputs::defaults);
            let away = fixture
                .away_team_id
                .and_then(|id| poisson.team_strengths.get(&id).cloned())
                .map(|s| TeamInputs {
                    attack: s.attack,
                    defense: s.defense,
                    used_fallback: false,
                })
                .unwrap_or_else(TeamInputs::defaults);

            let inputs = FixtureInputs {
                home,
                away,
                home_advantage: poisson.home_advantage,
                rho: poisson.rho,
                league_avg_draw_rate: league_draw_rate(&conn, fixture.league_id),
                odds: Some(fixture.odds.clone()),
                weather_factor: None,
                h2h_draw_rate: None,
                temperature,
                alpha_model: blending.alpha,
                calibration: calibration.cloned(),
                draw_calibration: draw_calibration.cloned(),
            };

            let output = pipeline::compute(&inputs, set_keys);
            for set in output.sets {
                predictions.push(Prediction {
                    fixture_order: fixture.match_order,
                    set_key: set.set_key,
                    probs: set.probs,
                    lambda_home: output.lambda_home,
                    lambda_away: output.lambda_away,
                    draw_structural: output.draw_structural.clone(),
                });
            }
        }
        Ok(predictions)
    }

    /// POST /tickets/generate: builds one ticket per requested role from a
    /// jackpot's per-fixture predictions (every role's set, including set A,
    /// must be present in `predictions` for every fixture) and assembles the
    /// portfolio-level diagnostics and favorite-hedge invariant over the
    /// resulting bundle.
    pub fn generate_tickets(
        &self,
        set_keys: &[SetKey],
        predictions: &[Prediction],
        opening_closing: &[Option<(Odds, Odds)>],
        fixtures: &[JackpotFixture],
    ) -> TicketBundle {
        let n = fixtures.len();
        let conn = self.conn.lock().unwrap();

        let mut probs_by_set: std::collections::HashMap<SetKey, Vec<crate::domain::Prob3>> =
            std::collections::HashMap::new();
        let mut lambdas: Vec<(f64, f64)> = vec![(0.0, 0.0); n];
        for p in predictions {
            let order = p.fixture_order as usize;
            if order < n {
                lambdas[order] = (p.lambda_home, p.lambda_away);
            }
            probs_by_set
                .entry(p.set_key)
                .or_insert_with(|| vec![crate::domain::Prob3::new(0.0, 0.0, 0.0); n])[order.min(n.saturating_sub(1))] =
                p.probs;
        }
        let set_a_probs = probs_by_set
            .get(&SetKey::A)
            .cloned()
            .unwrap_or_else(|| vec![crate::domain::Prob3::new(0.0, 0.0, 0.0); n]);

        let shocks: Vec<Option<ShockAssessment>> = opening_closing
            .iter()
            .zip(&set_a_probs)
            .map(|(oc, model_probs)| {
                oc.as_ref().map(|(opening, closing)| {
                    late_shock::assess(opening, closing, model_probs, ModelType::Poisson)
                })
            })
            .collect();

        let league_codes: Vec<Option<String>> = fixtures
            .iter()
            .map(|f| f.league_id.and_then(|id| league_code(&conn, id)))
            .collect();
        let pair_inputs: Vec<FixturePairInputs> = fixtures
            .iter()
            .zip(&set_a_probs)
            .zip(&lambdas)
            .zip(&league_codes)
            .map(|(((f, p), (lh, la)), code)| FixturePairInputs {
                fixture: f,
                league_code: code.as_deref(),
                market_probs: *p,
                lambda_home: *lh,
                lambda_away: *la,
            })
            .collect();
        let correlation = correlation::build_matrix(&pair_inputs, CorrelationWeights::default());
        drop(conn);

        let mut tickets: Vec<Ticket> = set_keys
            .iter()
            .map(|set_key| {
                let empty = vec![crate::domain::Prob3::new(0.0, 0.0, 0.0); n];
                let probs = probs_by_set.get(set_key).unwrap_or(&empty);
                ticket_generator::generate(*set_key, probs, &set_a_probs, &shocks, &correlation)
            })
            .collect();

        let favorites: Vec<Option<crate::domain::Outcome>> = set_a_probs
            .iter()
            .map(|p| {
                let fav = p.argmax();
                (p.get(fav) >= 0.65).then_some(fav)
            })
            .collect();

        let mut mutations = 0;
        for (i, favorite) in favorites.iter().enumerate() {
            let Some(favorite) = favorite else { continue };
            if tickets.iter().any(|t| t.picks[i] != *favorite) {
                continue;
            }
            if let Some(g_idx) = set_keys.iter().position(|k| *k == SetKey::G) {
                let empty = vec![crate::domain::Prob3::new(0.0, 0.0, 0.0); n];
                let g_probs = probs_by_set.get(&SetKey::G).unwrap_or(&empty);
                tickets[g_idx].picks[i] =
                    ticket_generator::next_best_non_favorite(&g_probs[i], *favorite);
                mutations += 1;
            }
        }

        let bundle_n = tickets.len();
        let mut agreement_matrix = vec![vec![0.0_f64; bundle_n]; bundle_n];
        for i in 0..bundle_n {
            agreement_matrix[i][i] = 1.0;
            for j in (i + 1)..bundle_n {
                let agree = tickets[i]
                    .picks
                    .iter()
                    .zip(&tickets[j].picks)
                    .filter(|(a, b)| a == b)
                    .count();
                let fraction = agree as f64 / n.max(1) as f64;
                agreement_matrix[i][j] = fraction;
                agreement_matrix[j][i] = fraction;
            }
        }

        let favorite_hedge_satisfied = favorites.iter().enumerate().all(|(i, favorite)| {
            favorite
                .map(|fav| tickets.iter().any(|t| t.picks[i] != fav))
                .unwrap_or(true)
        });

        TicketBundle {
            diagnostics: BundleDiagnostics {
                draw_counts: tickets.iter().map(|t| t.diagnostics.draw_count).collect(),
                entropies: tickets.iter().map(|t| t.diagnostics.entropy).collect(),
                agreement_matrix,
                favorite_hedge_satisfied,
                favorite_hedge_mutations: mutations,
            },
            tickets,
        }
    }

    /// POST /models/train/{type}: trains the Poisson model from the leagues'
    /// resolved historical matches and persists it as a new model row in
    /// `training` status.
    pub fn train_poisson_model(&self, league_id: i64, window_years: Option<u32>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let window = window_years.unwrap_or(self.config.model_default_window_years);
        let cutoff = (Utc::now() - chrono::Duration::days(365 * window as i64))
            .format("%Y-%m-%d")
            .to_string();

        let matches = load_finished_matches(&conn, league_id, &cutoff)?;
        if matches.len() < 50 {
            return Err(EngineError::InsufficientTrainingSamples {
                have: matches.len(),
                need: 50,
            });
        }

        let result = training::train_poisson(
            &matches,
            &std::collections::HashMap::new(),
            training::DEFAULT_XI,
            200,
        );
        let weights = PoissonWeights {
            team_strengths: result.strengths,
            home_advantage: result.home_advantage,
            rho: result.rho,
            xi_decay: result.xi,
        };
        let payload = serde_json::to_string(&weights).map_err(anyhow::Error::from)?;
        conn.execute(
            "INSERT INTO models (model_type, version, status, weights, training_leagues, training_window_years, training_matches, created_at)
             VALUES ('Poisson', ?1, 'training', ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().to_rfc3339(),
                payload,
                format!("[{league_id}]"),
                window,
                result.matches_used as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// POST /admin/leagues/update-statistics: recomputes a league's
    /// average draw rate from its finished matches.
    pub fn update_league_statistics(&self, league_id: i64) -> Result<f64> {
        let conn = self.conn.lock().unwrap();
        let (draws, total): (i64, i64) = conn.query_row(
            "SELECT COUNT(*) FILTER (WHERE home_goals = away_goals), COUNT(*)
             FROM matches WHERE league_id = ?1 AND home_goals IS NOT NULL",
            params![league_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        if total == 0 {
            return Err(EngineError::InsufficientTrainingSamples { have: 0, need: 1 });
        }
        let rate = draws as f64 / total as f64;
        conn.execute(
            "UPDATE leagues SET avg_draw_rate = ?1 WHERE id = ?2",
            params![rate, league_id],
        )?;
        Ok(rate)
    }

    /// GET /validation/export: rows flagged `exported_to_training`, used by
    /// the training service's calibration/draw-calibration fitting.
    pub fn export_validation(&self) -> Result<Vec<ValidationResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT fixture_id, set_key, prob_home, prob_draw, prob_away, actual_result, brier, log_loss, exported_to_training
             FROM validation_results WHERE exported_to_training = 1",
        )?;
        let rows = stmt.query_map([], |r| {
            let set_key_str: String = r.get(1)?;
            let actual_str: String = r.get(5)?;
            Ok((
                r.get::<_, i64>(0)?,
                set_key_str,
                r.get::<_, f64>(2)?,
                r.get::<_, f64>(3)?,
                r.get::<_, f64>(4)?,
                actual_str,
                r.get::<_, f64>(6)?,
                r.get::<_, f64>(7)?,
                r.get::<_, bool>(8)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (
                fixture_order,
                set_key_str,
                home,
                draw,
                away,
                actual_str,
                brier,
                log_loss,
                exported,
            ) = row?;
            let Some(set_key) = parse_set_key(&set_key_str) else {
                continue;
            };
            let Some(actual) = parse_outcome(&actual_str) else {
                continue;
            };
            out.push(ValidationResult {
                fixture_order,
                set_key,
                predicted: crate::domain::Prob3::new(home, draw, away),
                actual,
                brier,
                log_loss,
                exported_to_training: exported,
            });
        }
        Ok(out)
    }
}

/// Looks up the draw prior for a fixture's league. International (non-club)
/// fixtures rarely carry enough head-to-head history to trust their stored
/// average, so they fall back to a fixed prior instead.
fn league_draw_rate(conn: &Connection, league_id: Option<i64>) -> f64 {
    const DEFAULT_DRAW_RATE: f64 = 0.26;
    let Some(league_id) = league_id else {
        return DEFAULT_DRAW_RATE;
    };
    conn.query_row(
        "SELECT code, avg_draw_rate FROM leagues WHERE id = ?1",
        params![league_id],
        |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)),
    )
    .map(|(code, avg_draw_rate)| {
        if code == crate::domain::INTERNATIONAL_LEAGUE_CODE {
            crate::domain::INTERNATIONAL_DRAW_PRIOR
        } else {
            avg_draw_rate
        }
    })
    .unwrap_or(DEFAULT_DRAW_RATE)
}

fn league_code(conn: &Connection, league_id: i64) -> Option<String> {
    conn.query_row(
        "SELECT code FROM leagues WHERE id = ?1",
        params![league_id],
        |r| r.get(0),
    )
    .optional()
    .ok()
    .flatten()
}

fn parse_set_key(s: &str) -> Option<SetKey> {
    SetKey::ALL.into_iter().find(|k| format!("{k:?}") == s)
}

fn parse_outcome(s: &str) -> Option<crate::domain::Outcome> {
    match s {
        "Home" => Some(crate::domain::Outcome::Home),
        "Draw" => Some(crate::domain::Outcome::Draw),
        "Away" => Some(crate::domain::Outcome::Away),
        _ => None,
    }
}

fn load_finished_matches(
    conn: &Connection,
    league_id: i64,
    cutoff: &str,
) -> Result<Vec<HistoricalMatch>> {
    let mut stmt = conn.prepare(
        "SELECT id, league_id, home_team_id, away_team_id, match_date, home_goals, away_goals,
                ht_home_goals, ht_away_goals, odds_home, odds_draw, odds_away, source_file, ingestion_batch_id
         FROM matches WHERE league_id = ?1 AND match_date >= ?2 AND home_goals IS NOT NULL",
    )?;
    let rows = stmt.query_map(params![league_id, cutoff], |r| {
        Ok(HistoricalMatch {
            id: r.get(0)?,
            league_id: r.get(1)?,
            home_team_id: r.get(2)?,
            away_team_id: r.get(3)?,
            match_date: r.get(4)?,
            home_goals: r.get(5)?,
            away_goals: r.get(6)?,
            ht_home_goals: r.get(7)?,
            ht_away_goals: r.get(8)?,
            odds_home: r.get(9)?,
            odds_draw: r.get(10)?,
            odds_away: r.get(11)?,
            source_file: r.get(12)?,
            ingestion_batch_id: r.get(13)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// TeamStrength is re-exported here because api.rs is the boundary callers
/// reach it through when seeding a `PoissonWeights` by hand (e.g. tests).
pub type Strength = TeamStrength;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_list_jackpot_roundtrip() {
        let engine = Engine::open_in_memory().unwrap();
        let fixtures = vec![JackpotFixture {
            match_order: 1,
            home_team_name: "Arsenal".to_string(),
            away_team_name: "Chelsea".to_string(),
            home_team_id: None,
            away_team_id: None,
            league_id: None,
            odds: Odds {
                home: 2.0,
                draw: 3.3,
                away: 3.6,
            },
            opening_odds: None,
            kickoff_ts: None,
        }];
        let id = engine
            .create_jackpot(&fixtures, Some("2026-08-01"))
            .unwrap();
        let jackpots = engine.list_jackpots().unwrap();
        assert_eq!(jackpots.len(), 1);
        assert_eq!(jackpots[0].id, id);
        assert_eq!(jackpots[0].fixtures.len(), 1);
    }

    #[test]
    fn train_poisson_model_requires_minimum_matches() {
        let engine = Engine::open_in_memory().unwrap();
        let err = engine.train_poisson_model(1, Some(3)).unwrap_err();
        matches!(err, EngineError::InsufficientTrainingSamples { .. });
    }

    #[test]
    fn generate_tickets_enforces_favorite_hedge_across_the_bundle() {
        use crate::domain::{DrawStructuralComponents, Prob3};

        let engine = Engine::open_in_memory().unwrap();
        let fixtures = vec![JackpotFixture {
            match_order: 0,
            home_team_name: "Arsenal".to_string(),
            away_team_name: "Luton".to_string(),
            home_team_id: None,
            away_team_id: None,
            league_id: None,
            odds: Odds {
                home: 1.2,
                draw: 6.5,
                away: 12.0,
            },
            opening_odds: None,
            kickoff_ts: None,
        }];

        let components = DrawStructuralComponents {
            draw_signal: 0.2,
            market_draw_prob: None,
            weather_factor: None,
            h2h_draw_rate: None,
            league_draw_rate: None,
        };
        let set_keys = [SetKey::A, SetKey::F, SetKey::G];
        let predictions: Vec<Prediction> = set_keys
            .iter()
            .map(|set_key| Prediction {
                fixture_order: 0,
                set_key: *set_key,
                probs: Prob3::new(0.80, 0.12, 0.08),
                lambda_home: 2.1,
                lambda_away: 0.4,
                draw_structural: components.clone(),
            })
            .collect();

        let bundle = engine.generate_tickets(&set_keys, &predictions, &[None], &fixtures);
        assert_eq!(bundle.tickets.len(), 3);
        assert!(bundle.diagnostics.favorite_hedge_satisfied);
        assert!(
            bundle
                .tickets
                .iter()
                .any(|t| t.picks[0] != crate::domain::Outcome::Home),
            "at least one ticket must deviate from the 0.80-probability favorite"
        );
    }
}
