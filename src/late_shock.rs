//! Late-Shock Detector: flags fixtures where closing odds have moved enough
//! from opening odds, relative to the model's own probabilities, to suggest
//! information the model hasn't absorbed (injury news, lineup leaks).
//!
//! Home/away/favorite movement is measured as a ratio on the raw decimal
//! odds; draw collapse is measured as a delta on implied probabilities,
//! since a fixed odds delta means different things at different odds
//! levels. Each triggered indicator contributes a fixed increment, and the
//! total is capped at 1.0.

use crate::domain::{ModelType, Odds, OddsMovement, Prob3};

const TRIGGER_THRESHOLD: f64 = 0.5;

const ODDS_MOVE_RATIO: f64 = 0.10;
const ODDS_MOVE_SCORE: f64 = 0.35;
const DRAW_COLLAPSE_DELTA: f64 = 0.08;
const DRAW_COLLAPSE_SCORE: f64 = 0.35;
const FAVORITE_DRIFT_RATIO: f64 = 0.10;
const FAVORITE_DRIFT_SCORE: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShockReason {
    OddsMoveHome,
    OddsMoveAway,
    DrawCollapse,
    FavoriteDrift,
}

#[derive(Debug, Clone)]
pub struct ShockAssessment {
    pub score: f64,
    pub triggered: bool,
    pub reasons: Vec<ShockReason>,
    pub movement: OddsMovement,
}

fn odds_move_ratio(opening: f64, closing: f64) -> f64 {
    (closing - opening).abs() / opening.max(1e-9)
}

/// `model_probs` should be from the same model used for the fixture's other
/// sets, not necessarily the market-blended one, so closing-odds divergence
/// is measured against the model's own independent view. `model_probs` is
/// unused by [`ModelType`] selection today but kept to anchor the caller's
/// choice of which model's probabilities to compare against.
pub fn assess(
    opening: &Odds,
    closing: &Odds,
    model_probs: &Prob3,
    _model_type: ModelType,
) -> ShockAssessment {
    let mut reasons = Vec::new();
    let mut score = 0.0_f64;

    if odds_move_ratio(opening.home, closing.home) >= ODDS_MOVE_RATIO {
        score += ODDS_MOVE_SCORE;
        reasons.push(ShockReason::OddsMoveHome);
    }
    if odds_move_ratio(opening.away, closing.away) >= ODDS_MOVE_RATIO {
        score += ODDS_MOVE_SCORE;
        reasons.push(ShockReason::OddsMoveAway);
    }
    let opening_probs = opening.implied_probabilities();
    let closing_probs = closing.implied_probabilities();
    if opening_probs.draw - closing_probs.draw >= DRAW_COLLAPSE_DELTA {
        score += DRAW_COLLAPSE_SCORE;
        reasons.push(ShockReason::DrawCollapse);
    }

    let favorite = model_probs.argmax();
    let favorite_ratio = odds_move_ratio(opening.get(favorite), closing.get(favorite));
    if favorite_ratio >= FAVORITE_DRIFT_RATIO {
        score += FAVORITE_DRIFT_SCORE;
        reasons.push(ShockReason::FavoriteDrift);
    }

    let score = score.min(1.0);
    ShockAssessment {
        score,
        triggered: score >= TRIGGER_THRESHOLD,
        reasons,
        movement: OddsMovement {
            opening: opening.clone(),
            closing: closing.clone(),
            delta_draw: closing_probs.draw - opening_probs.draw,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_odds_do_not_trigger() {
        let opening = Odds {
            home: 2.0,
            draw: 3.2,
            away: 3.8,
        };
        let closing = Odds {
            home: 2.02,
            draw: 3.18,
            away: 3.75,
        };
        let model = Prob3::new(0.45, 0.28, 0.27);
        let a = assess(&opening, &closing, &model, ModelType::Poisson);
        assert!(!a.triggered);
    }

    #[test]
    fn draw_collapse_is_detected() {
        let opening = Odds {
            home: 2.5,
            draw: 3.0,
            away: 3.0,
        };
        let closing = Odds {
            home: 1.6,
            draw: 4.5,
            away: 5.5,
        };
        let model = Prob3::new(0.40, 0.33, 0.27);
        let a = assess(&opening, &closing, &model, ModelType::Poisson);
        assert!(a.reasons.contains(&ShockReason::DrawCollapse));
    }
}
