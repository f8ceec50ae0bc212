//! Correlation Matrix Builder: builds an N×N fixture-fixture correlation
//! matrix from a sum of fixed-weight thresholded indicators, used by the
//! ticket generator to break up correlated picks.

use crate::domain::{JackpotFixture, Prob3};
use crate::draw_signal::{self, DrawSignalInputs};

#[derive(Debug, Clone, Copy)]
pub struct CorrelationWeights {
    pub same_league: f64,
    pub kickoff_proximity: f64,
    pub odds_shape: f64,
    pub draw_regime: f64,
    pub lambda_total: f64,
}

impl Default for CorrelationWeights {
    fn default() -> Self {
        Self {
            same_league: 0.25,
            kickoff_proximity: 0.20,
            odds_shape: 0.20,
            draw_regime: 0.20,
            lambda_total: 0.15,
        }
    }
}

/// Per-league multipliers applied to a subset of the base weights before
/// clipping. League codes are matched case-insensitively.
#[derive(Debug, Clone, Copy)]
pub struct LeagueWeightOverride {
    pub odds_shape_multiplier: f64,
    pub draw_regime_multiplier: f64,
}

fn league_override(league_code: Option<&str>) -> Option<LeagueWeightOverride> {
    match league_code {
        Some(code) if code.eq_ignore_ascii_case("EPL") || code.eq_ignore_ascii_case("premier_league") => {
            Some(LeagueWeightOverride {
                odds_shape_multiplier: 1.25,
                draw_regime_multiplier: 1.15,
            })
        }
        _ => None,
    }
}

const KICKOFF_PROXIMITY_WINDOW_SECS: i64 = 90 * 60;
const ODDS_SHAPE_GAP_THRESHOLD: f64 = 0.25;
const DRAW_REGIME_THRESHOLD: f64 = 0.15;
const LAMBDA_TOTAL_THRESHOLD: f64 = 0.5;

pub struct FixturePairInputs<'a> {
    pub fixture: &'a JackpotFixture,
    pub league_code: Option<&'a str>,
    pub market_probs: Prob3,
    pub lambda_home: f64,
    pub lambda_away: f64,
}

/// Builds a symmetric N×N matrix (diagonal 1.0) of pairwise correlation
/// scores in [0, 1], one row/column per entry in `fixtures` in order.
pub fn build_matrix(fixtures: &[FixturePairInputs], weights: CorrelationWeights) -> Vec<Vec<f64>> {
    let n = fixtures.len();
    let mut matrix = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let score = pairwise_score(&fixtures[i], &fixtures[j], weights);
            matrix[i][j] = score;
            matrix[j][i] = score;
        }
    }
    matrix
}

fn draw_signal_of(pair: &FixturePairInputs) -> f64 {
    let inputs = DrawSignalInputs {
        lambda_home: pair.lambda_home,
        lambda_away: pair.lambda_away,
        market_draw_prob: Some(pair.market_probs.draw),
        weather_factor: None,
        h2h_draw_rate: None,
        league_draw_rate: None,
    };
    draw_signal::assemble(&inputs).0
}

fn pairwise_score(a: &FixturePairInputs, b: &FixturePairInputs, w: CorrelationWeights) -> f64 {
    let mut weights = w;
    if let Some(o) = league_override(a.league_code).or_else(|| league_override(b.league_code)) {
        weights.odds_shape *= o.odds_shape_multiplier;
        weights.draw_regime *= o.draw_regime_multiplier;
    }

    let mut score = 0.0;

    let same_league = match (a.fixture.league_id, b.fixture.league_id) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    };
    if same_league {
        score += weights.same_league;
    }

    if let (Some(ta), Some(tb)) = (a.fixture.kickoff_ts, b.fixture.kickoff_ts)
        && (ta - tb).abs() <= KICKOFF_PROXIMITY_WINDOW_SECS
    {
        score += weights.kickoff_proximity;
    }

    let home_away_a = a.market_probs.home - a.market_probs.away;
    let home_away_b = b.market_probs.home - b.market_probs.away;
    if (home_away_a - home_away_b).abs() < ODDS_SHAPE_GAP_THRESHOLD {
        score += weights.odds_shape * 0.5;
    }

    let draw_min_a = a.market_probs.draw - a.market_probs.home.min(a.market_probs.away);
    let draw_min_b = b.market_probs.draw - b.market_probs.home.min(b.market_probs.away);
    if (draw_min_a - draw_min_b).abs() < ODDS_SHAPE_GAP_THRESHOLD {
        score += weights.odds_shape * 0.5;
    }

    let s_a = draw_signal_of(a);
    let s_b = draw_signal_of(b);
    if (s_a - s_b).abs() < DRAW_REGIME_THRESHOLD {
        score += weights.draw_regime;
    }

    let total_a = a.lambda_home + a.lambda_away;
    let total_b = b.lambda_home + b.lambda_away;
    if (total_a - total_b).abs() < LAMBDA_TOTAL_THRESHOLD {
        score += weights.lambda_total;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Odds;

    fn fixture(league_id: i64, kickoff_ts: i64, odds: Odds) -> JackpotFixture {
        JackpotFixture {
            match_order: 0,
            home_team_name: "H".into(),
            away_team_name: "A".into(),
            home_team_id: None,
            away_team_id: None,
            league_id: Some(league_id),
            odds,
            opening_odds: None,
            kickoff_ts: Some(kickoff_ts),
        }
    }

    #[test]
    fn identical_fixtures_fully_correlated_on_shared_indicators() {
        let f1 = fixture(
            1,
            1_000,
            Odds {
                home: 2.0,
                draw: 3.2,
                away: 3.8,
            },
        );
        let f2 = fixture(
            1,
            1_500,
            Odds {
                home: 2.0,
                draw: 3.2,
                away: 3.8,
            },
        );
        let inputs = vec![
            FixturePairInputs {
                fixture: &f1,
                league_code: None,
                market_probs: Prob3::new(0.4, 0.3, 0.3),
                lambda_home: 1.4,
                lambda_away: 1.1,
            },
            FixturePairInputs {
                fixture: &f2,
                league_code: None,
                market_probs: Prob3::new(0.4, 0.3, 0.3),
                lambda_home: 1.4,
                lambda_away: 1.1,
            },
        ];
        let m = build_matrix(&inputs, CorrelationWeights::default());
        assert_eq!(m[0][0], 1.0);
        assert!(m[0][1] > 0.9);
        assert_eq!(m[0][1], m[1][0]);
    }

    #[test]
    fn league_override_raises_score_over_unweighted() {
        let f1 = fixture(
            1,
            0,
            Odds {
                home: 2.0,
                draw: 3.2,
                away: 3.8,
            },
        );
        let f2 = fixture(
            2,
            10_000,
            Odds {
                home: 2.0,
                draw: 3.2,
                away: 3.8,
            },
        );
        let base = |league_code| FixturePairInputs {
            fixture: &f1,
            league_code,
            market_probs: Prob3::new(0.4, 0.25, 0.35),
            lambda_home: 1.3,
            lambda_away: 1.2,
        };
        let other = |league_code| FixturePairInputs {
            fixture: &f2,
            league_code,
            market_probs: Prob3::new(0.4, 0.25, 0.35),
            lambda_home: 1.3,
            lambda_away: 1.2,
        };

        let plain = build_matrix(&[base(None), other(None)], CorrelationWeights::default());
        let overridden = build_matrix(&[base(Some("EPL")), other(None)], CorrelationWeights::default());
        assert!(overridden[0][1] > plain[0][1]);
    }

    #[test]
    fn unrelated_fixtures_score_lower() {
        let f1 = fixture(
            1,
            0,
            Odds {
                home: 1.5,
                draw: 4.0,
                away: 6.0,
            },
        );
        let f2 = fixture(
            2,
            1_000_000,
            Odds {
                home: 6.0,
                draw: 4.0,
                away: 1.5,
            },
        );
        let inputs = vec![
            FixturePairInputs {
                fixture: &f1,
                league_code: None,
                market_probs: Prob3::new(0.6, 0.2, 0.2),
                lambda_home: 2.2,
                lambda_away: 0.6,
            },
            FixturePairInputs {
                fixture: &f2,
                league_code: None,
                market_probs: Prob3::new(0.2, 0.2, 0.6),
                lambda_home: 0.6,
                lambda_away: 2.2,
            },
        ];
        let m = build_matrix(&inputs, CorrelationWeights::default());
        assert!(m[0][1] < 0.5);
    }
}
