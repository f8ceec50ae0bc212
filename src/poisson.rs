//! Stage 1 of the probability pipeline: base Poisson / Dixon-Coles model.
//! Per-team attack/defense strengths and an explicit home_advantage term
//! feed a low-score correlation correction (rho) over independent Poisson
//! goal distributions.

use crate::domain::Prob3;

pub const MAX_GOALS: u32 = 10;

pub struct PoissonOutcome {
    pub probs: Prob3,
    pub lambda_home: f64,
    pub lambda_away: f64,
}

/// lambda_home = exp(ln(attack_home) - ln(defense_away) + home_advantage)
/// lambda_away = exp(ln(attack_away) - ln(defense_home))
pub fn expected_goals(
    attack_home: f64,
    defense_home: f64,
    attack_away: f64,
    defense_away: f64,
    home_advantage: f64,
) -> (f64, f64) {
    let lambda_home = (attack_home.max(1e-6).ln() - defense_away.max(1e-6).ln() + home_advantage)
        .exp()
        .clamp(0.05, 8.0);
    let lambda_away = (attack_away.max(1e-6).ln() - defense_home.max(1e-6).ln())
        .exp()
        .clamp(0.05, 8.0);
    (lambda_home, lambda_away)
}

pub fn dc_tau(
    home_goals: u32,
    away_goals: u32,
    lambda_home: f64,
    lambda_away: f64,
    rho: f64,
) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

pub fn poisson_pmf(goals: u32, lambda: f64) -> f64 {
    let numer = lambda.powi(goals as i32) * (-lambda).exp();
    let denom = (1..=goals).fold(1.0_f64, |acc, k| acc * k as f64).max(1.0);
    numer / denom
}

/// The joint score distribution over [0..K]^2, corrected by the
/// Dixon-Coles low-score term, collapsed into Home/Draw/Away mass and
/// normalized.
pub fn outcome_probs(lambda_home: f64, lambda_away: f64, rho: f64, max_goals: u32) -> Prob3 {
    let mut p_home = 0.0_f64;
    let mut p_draw = 0.0_f64;
    let mut p_away = 0.0_f64;

    for h in 0..=max_goals {
        for a in 0..=max_goals {
            let base = poisson_pmf(h, lambda_home) * poisson_pmf(a, lambda_away);
            let p = (base * dc_tau(h, a, lambda_home, lambda_away, rho)).max(0.0);
            if h > a {
                p_home += p;
            } else if h == a {
                p_draw += p;
            } else {
                p_away += p;
            }
        }
    }

    Prob3::new(p_home, p_draw, p_away).normalize()
}

/// Full Stage 1: resolves team strengths (falling back to (1.0, 1.0)
/// defaults when absent) and produces the base outcome
/// distribution plus the expected goals used by later stages.
pub fn stage1_base(
    attack_home: f64,
    defense_home: f64,
    attack_away: f64,
    defense_away: f64,
    home_advantage: f64,
    rho: f64,
) -> PoissonOutcome {
    let (lambda_home, lambda_away) = expected_goals(
        attack_home,
        defense_home,
        attack_away,
        defense_away,
        home_advantage,
    );
    let probs = outcome_probs(lambda_home, lambda_away, rho, MAX_GOALS);
    PoissonOutcome {
        probs,
        lambda_home,
        lambda_away,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_probs_sum_to_one() {
        let p = outcome_probs(1.4, 1.1, -0.1, MAX_GOALS);
        assert!((p.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stronger_home_team_favored() {
        let out = stage1_base(1.6, 0.8, 0.9, 1.1, 0.3, -0.1);
        assert!(out.probs.home > out.probs.away);
    }

    #[test]
    fn equal_teams_have_symmetric_sides_with_no_home_advantage() {
        let out = stage1_base(1.0, 1.0, 1.0, 1.0, 0.0, -0.1);
        assert!((out.probs.home - out.probs.away).abs() < 1e-9);
    }
}
