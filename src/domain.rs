//! Core entity types shared across the engine: leagues, teams, matches,
//! models, jackpots, and predictions. These mirror the persisted-state
//! layout the rest of the crate reads and writes through `db.rs`.

use serde::{Deserialize, Serialize};

/// One of the three match outcomes. Kept as a closed enum everywhere in the
/// engine instead of an open-ended string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub fn from_goals(home_goals: i64, away_goals: i64) -> Self {
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => Outcome::Home,
            std::cmp::Ordering::Less => Outcome::Away,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    pub fn as_pick(self) -> &'static str {
        match self {
            Outcome::Home => "1",
            Outcome::Draw => "X",
            Outcome::Away => "2",
        }
    }
}

/// A probability triple over {Home, Draw, Away}. Every pipeline stage
/// produces and consumes this type; it is never represented as a
/// `HashMap<&str, f64>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub const EPS: f64 = 1e-6;

    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self { home, draw, away }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    pub fn is_finite(&self) -> bool {
        self.home.is_finite() && self.draw.is_finite() && self.away.is_finite()
    }

    /// True iff the triple sums to 1 within `Prob3::EPS` and every component
    /// is within [0, 1].
    pub fn is_coherent(&self) -> bool {
        self.is_finite()
            && (self.sum() - 1.0).abs() < Self::EPS
            && (0.0..=1.0).contains(&self.home)
            && (0.0..=1.0).contains(&self.draw)
            && (0.0..=1.0).contains(&self.away)
    }

    pub fn normalize(&self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Self::uniform();
        }
        Self {
            home: self.home / sum,
            draw: self.draw / sum,
            away: self.away / sum,
        }
    }

    pub fn argmax(&self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.draw >= self.away {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    pub fn set(&mut self, outcome: Outcome, value: f64) {
        match outcome {
            Outcome::Home => self.home = value,
            Outcome::Draw => self.draw = value,
            Outcome::Away => self.away = value,
        }
    }

    /// Shannon entropy divided by ln(3), in [0, 1].
    pub fn normalized_entropy(&self) -> f64 {
        let mut h = 0.0;
        for p in [self.home, self.draw, self.away] {
            if p > 0.0 {
                h -= p * p.ln();
            }
        }
        h / 3.0_f64.ln()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub code: String,
    pub name: String,
    pub country: String,
    pub tier: i64,
    pub avg_draw_rate: f64,
    pub home_advantage: f64,
    pub is_active: bool,
}

pub const GLOBAL_BASELINE_DRAW_RATE: f64 = 0.26;
pub const DEFAULT_HOME_ADVANTAGE: f64 = 0.35;
/// Synthetic league code for international (non-club) fixtures.
pub const INTERNATIONAL_LEAGUE_CODE: &str = "INT";
pub const INTERNATIONAL_DRAW_PRIOR: f64 = 0.25;

impl League {
    pub fn defaults(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            country: String::new(),
            tier: 1,
            avg_draw_rate: GLOBAL_BASELINE_DRAW_RATE,
            home_advantage: DEFAULT_HOME_ADVANTAGE,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub league_id: i64,
    pub name: String,
    pub canonical_name: String,
    pub alternative_names: Vec<String>,
    pub attack_rating: f64,
    pub defense_rating: f64,
    pub home_bias: f64,
    pub last_trained_at: Option<String>,
}

impl Team {
    pub fn new(id: i64, league_id: i64, name: &str, canonical_name: &str) -> Self {
        Self {
            id,
            league_id,
            name: name.to_string(),
            canonical_name: canonical_name.to_string(),
            alternative_names: Vec::new(),
            attack_rating: 1.0,
            defense_rating: 1.0,
            home_bias: 0.0,
            last_trained_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Odds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Odds {
    /// Converts decimal odds to implied probabilities with the overround
    /// removed (each 1/odds normalized to sum to 1).
    pub fn implied_probabilities(&self) -> Prob3 {
        let inv_h = 1.0 / self.home.max(1e-9);
        let inv_d = 1.0 / self.draw.max(1e-9);
        let inv_a = 1.0 / self.away.max(1e-9);
        Prob3::new(inv_h, inv_d, inv_a).normalize()
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalMatch {
    pub id: i64,
    pub league_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub match_date: String,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    pub ht_home_goals: Option<i64>,
    pub ht_away_goals: Option<i64>,
    pub odds_home: Option<f64>,
    pub odds_draw: Option<f64>,
    pub odds_away: Option<f64>,
    pub source_file: Option<String>,
    pub ingestion_batch_id: Option<String>,
}

impl HistoricalMatch {
    pub fn result(&self) -> Option<Outcome> {
        let (h, a) = (self.home_goals?, self.away_goals?);
        Some(Outcome::from_goals(h, a))
    }

    pub fn is_resolved(&self) -> bool {
        self.home_goals.is_some() && self.away_goals.is_some()
    }

    pub fn total_lambda_hint(&self) -> Option<f64> {
        Some((self.home_goals? + self.away_goals?) as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    Poisson,
    Blending,
    Calibration,
    DrawCalibration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStatus {
    Training,
    Active,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStrength {
    pub attack: f64,
    pub defense: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotonicCurve {
    /// Monotone-non-decreasing (x, y) knots produced by pool-adjacent-violators.
    pub knots: Vec<(f64, f64)>,
}

impl IsotonicCurve {
    pub fn identity() -> Self {
        Self {
            knots: vec![(0.0, 0.0), (1.0, 1.0)],
        }
    }

    /// Piecewise-linear interpolation between knots; clamps outside range.
    pub fn apply(&self, x: f64) -> f64 {
        if self.knots.is_empty() {
            return x;
        }
        if x <= self.knots[0].0 {
            return self.knots[0].1;
        }
        let last = self.knots.len() - 1;
        if x >= self.knots[last].0 {
            return self.knots[last].1;
        }
        for w in self.knots.windows(2) {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if x >= x0 && x <= x1 {
                if (x1 - x0).abs() < 1e-12 {
                    return y1;
                }
                let t = (x - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        self.knots[last].1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoissonWeights {
    pub team_strengths: std::collections::HashMap<i64, TeamStrength>,
    pub home_advantage: f64,
    pub rho: f64,
    pub xi_decay: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendingWeights {
    pub alpha: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationWeights {
    pub home: IsotonicCurve,
    pub draw: IsotonicCurve,
    pub away: IsotonicCurve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawCalibrationWeights {
    pub draw: IsotonicCurve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub model_type: ModelType,
    pub version: String,
    pub status: ModelStatus,
    pub training_leagues: Vec<i64>,
    pub training_window_years: i64,
    pub training_matches: i64,
    pub temperature: f64,
    pub created_at: String,
}

/// A fixture as carried inside a jackpot: team names plus odds, resolved
/// lazily by the Team Resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JackpotFixture {
    pub match_order: i64,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    pub league_id: Option<i64>,
    pub odds: Odds,
    pub opening_odds: Option<Odds>,
    pub kickoff_ts: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jackpot {
    pub id: i64,
    pub fixtures: Vec<JackpotFixture>,
    pub kickoff_date: Option<String>,
}

/// Named probability-set variants. Sets H-J are reserved for future use
/// and are not computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetKey {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl SetKey {
    pub const ALL: [SetKey; 7] = [
        SetKey::A,
        SetKey::B,
        SetKey::C,
        SetKey::D,
        SetKey::E,
        SetKey::F,
        SetKey::G,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawStructuralComponents {
    pub draw_signal: f64,
    pub market_draw_prob: Option<f64>,
    pub weather_factor: Option<f64>,
    pub h2h_draw_rate: Option<f64>,
    pub league_draw_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub fixture_order: i64,
    pub set_key: SetKey,
    pub probs: Prob3,
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub draw_structural: DrawStructuralComponents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub fixture_order: i64,
    pub set_key: SetKey,
    pub predicted: Prob3,
    pub actual: Outcome,
    pub brier: f64,
    pub log_loss: f64,
    pub exported_to_training: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsMovement {
    pub opening: Odds,
    pub closing: Odds,
    pub delta_draw: f64,
}
