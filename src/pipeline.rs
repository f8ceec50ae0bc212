//! Probability Pipeline: the staged transformer Poisson/Dixon-Coles ->
//! draw-prior injection -> draw-structural adjustment -> temperature
//! scaling -> market blending -> isotonic calibration, plus the A-G set
//! variants built on top of it.

use crate::domain::{
    CalibrationWeights, DrawCalibrationWeights, DrawStructuralComponents,
    GLOBAL_BASELINE_DRAW_RATE, Odds, Prob3, SetKey,
};
use crate::draw_signal::{self, DrawSignalInputs};
use crate::error::Warning;
use crate::poisson;

#[derive(Debug, Clone)]
pub struct TeamInputs {
    pub attack: f64,
    pub defense: f64,
    pub used_fallback: bool,
}

impl TeamInputs {
    pub fn defaults() -> Self {
        Self {
            attack: 1.0,
            defense: 1.0,
            used_fallback: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixtureInputs {
    pub home: TeamInputs,
    pub away: TeamInputs,
    pub home_advantage: f64,
    pub rho: f64,
    pub league_avg_draw_rate: f64,
    pub odds: Option<Odds>,
    pub weather_factor: Option<f64>,
    pub h2h_draw_rate: Option<f64>,
    pub temperature: f64,
    pub alpha_model: f64,
    pub calibration: Option<CalibrationWeights>,
    pub draw_calibration: Option<DrawCalibrationWeights>,
}

#[derive(Debug, Clone)]
pub struct SetOutput {
    pub set_key: SetKey,
    pub probs: Prob3,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub draw_structural: DrawStructuralComponents,
    pub sets: Vec<SetOutput>,
    pub warnings: Vec<Warning>,
}

/// Stage 2: draw-prior injection.
fn stage2_draw_prior(probs: Prob3, league_avg_draw_rate: f64) -> Prob3 {
    let multiplier = (league_avg_draw_rate / GLOBAL_BASELINE_DRAW_RATE).clamp(0.9, 1.2);
    let mut p_draw = (probs.draw * multiplier).clamp(0.12, 0.38);
    let remaining = (1.0 - p_draw).max(0.0);
    let non_draw_sum = (probs.home + probs.away).max(1e-9);
    let p_home = remaining * (probs.home / non_draw_sum);
    let p_away = remaining * (probs.away / non_draw_sum);
    p_draw = 1.0 - p_home - p_away;
    Prob3::new(p_home, p_draw, p_away)
}

fn compress_toward_midpoint(probs: &mut Prob3, k: f64) {
    let m = (probs.home + probs.away) / 2.0;
    probs.home = m + (probs.home - m) * k;
    probs.away = m + (probs.away - m) * k;
}

/// Stage 3: draw-structural adjustment (home/away compression).
fn stage3_draw_structural(
    mut probs: Prob3,
    lambda_home: f64,
    lambda_away: f64,
    inputs: &FixtureInputs,
) -> (Prob3, DrawStructuralComponents) {
    let market_draw_prob = inputs.odds.as_ref().map(|o| o.implied_probabilities().draw);

    let (s, mut components) = draw_signal::assemble(&DrawSignalInputs {
        lambda_home,
        lambda_away,
        market_draw_prob,
        weather_factor: inputs.weather_factor,
        h2h_draw_rate: inputs.h2h_draw_rate,
        league_draw_rate: Some(inputs.league_avg_draw_rate),
    });
    components.league_draw_rate = Some(inputs.league_avg_draw_rate);

    if s > 0.6 {
        let k = (0.6 + (1.0 - s) * 0.3).clamp(0.4, 1.0);
        compress_toward_midpoint(&mut probs, k);
    }

    let lambda_diff = (lambda_home - lambda_away).abs();
    if lambda_diff < 0.3 {
        let k_prime = (-2.0 * lambda_diff).exp();
        compress_toward_midpoint(&mut probs, k_prime);
    }

    if let Some(market_draw) = market_draw_prob {
        let delta = market_draw - probs.draw;
        if delta > 0.0 {
            let transfer = 0.5 * delta;
            if probs.home >= probs.away {
                probs.home = (probs.home - transfer).max(0.0);
            } else {
                probs.away = (probs.away - transfer).max(0.0);
            }
            probs.draw = (probs.draw + transfer).clamp(0.18, 0.38);
        }
    }

    let total_lambda = lambda_home + lambda_away;
    if total_lambda < 2.1 {
        let factor = (total_lambda / 2.1).clamp(0.0, 1.0);
        compress_toward_midpoint(&mut probs, factor);
    }

    (probs.normalize(), components)
}

/// Stage 4: temperature scaling. T > 1 softens, T < 1 sharpens.
fn stage4_temperature(probs: Prob3, temperature: f64) -> Prob3 {
    let t = temperature.clamp(0.8, 2.0);
    let inv_t = 1.0 / t;
    let h = probs.home.max(0.0).powf(inv_t);
    let d = probs.draw.max(0.0).powf(inv_t);
    let a = probs.away.max(0.0).powf(inv_t);
    Prob3::new(h, d, a).normalize()
}

/// Stage 5: market blending. `alpha_cap` lets set C clamp alpha_eff <= 0.35.
fn stage5_blend(probs: Prob3, odds: Option<&Odds>, alpha_model: f64, alpha_cap: f64) -> Prob3 {
    let Some(odds) = odds else { return probs };
    let market = odds.implied_probabilities();
    let alpha_eff = (alpha_model * probs.normalized_entropy()).clamp(0.15, alpha_cap);
    Prob3::new(
        alpha_eff * probs.home + (1.0 - alpha_eff) * market.home,
        alpha_eff * probs.draw + (1.0 - alpha_eff) * market.draw,
        alpha_eff * probs.away + (1.0 - alpha_eff) * market.away,
    )
    .normalize()
}

/// Stage 6: isotonic calibration, applied per-outcome then renormalized;
/// draw-calibration (if present) is applied to p_D only, afterward.
fn stage6_calibrate(
    probs: Prob3,
    calibration: Option<&CalibrationWeights>,
    draw_calibration: Option<&DrawCalibrationWeights>,
) -> Prob3 {
    let mut out = probs;
    if let Some(cal) = calibration {
        out = Prob3::new(
            cal.home.apply(out.home),
            cal.draw.apply(out.draw),
            cal.away.apply(out.away),
        )
        .normalize();
    }
    if let Some(draw_cal) = draw_calibration {
        out.draw = draw_cal.draw.apply(out.draw);
        out = out.normalize();
    }
    out
}

fn recover_if_degenerate(probs: Prob3, warnings: &mut Vec<Warning>, context: &str) -> Prob3 {
    if probs.is_coherent() {
        probs
    } else {
        warnings.push(Warning::DegenerateProbability {
            detail: context.to_string(),
        });
        Prob3::uniform()
    }
}

/// Runs stages 1-6 for set A, recording lambda/draw-structural diagnostics,
/// then derives sets B, C, D-G from intermediate results.
pub fn compute(inputs: &FixtureInputs, set_keys: &[SetKey]) -> PipelineOutput {
    let mut warnings = Vec::new();
    if inputs.home.used_fallback {
        warnings.push(Warning::InsufficientTeamData {
            team_ref: "home".to_string(),
        });
    }
    if inputs.away.used_fallback {
        warnings.push(Warning::InsufficientTeamData {
            team_ref: "away".to_string(),
        });
    }

    let stage1 = poisson::stage1_base(
        inputs.home.attack,
        inputs.home.defense,
        inputs.away.attack,
        inputs.away.defense,
        inputs.home_advantage,
        inputs.rho,
    );
    let lambda_home = stage1.lambda_home;
    let lambda_away = stage1.lambda_away;

    let after_prior = stage2_draw_prior(stage1.probs, inputs.league_avg_draw_rate);
    let (after_structural, draw_structural) =
        stage3_draw_structural(after_prior, lambda_home, lambda_away, inputs);
    let after_temperature = stage4_temperature(after_structural, inputs.temperature);

    let mut sets = Vec::new();
    for &key in set_keys {
        let probs = match key {
            SetKey::A => {
                let blended = stage5_blend(
                    after_temperature,
                    inputs.odds.as_ref(),
                    inputs.alpha_model,
                    0.75,
                );
                stage6_calibrate(
                    blended,
                    inputs.calibration.as_ref(),
                    inputs.draw_calibration.as_ref(),
                )
            }
            SetKey::B => {
                let blended = stage5_blend(
                    after_temperature,
                    inputs.odds.as_ref(),
                    inputs.alpha_model,
                    0.75,
                );
                let boosted =
                    Prob3::new(blended.home, blended.draw + 0.03, blended.away).normalize();
                stage6_calibrate(
                    boosted,
                    inputs.calibration.as_ref(),
                    inputs.draw_calibration.as_ref(),
                )
            }
            SetKey::C => {
                let blended = stage5_blend(
                    after_temperature,
                    inputs.odds.as_ref(),
                    inputs.alpha_model,
                    0.35,
                );
                stage6_calibrate(
                    blended,
                    inputs.calibration.as_ref(),
                    inputs.draw_calibration.as_ref(),
                )
            }
            SetKey::D => heuristic_set(after_temperature, inputs, HeuristicKind::HigherEntropy),
            SetKey::E => heuristic_set(after_temperature, inputs, HeuristicKind::UnderdogTilt),
            SetKey::F => heuristic_set(after_temperature, inputs, HeuristicKind::AntiFavorite),
            SetKey::G => heuristic_set(after_temperature, inputs, HeuristicKind::Balanced),
        };
        let coherent = recover_if_degenerate(probs, &mut warnings, &format!("{key:?}"));
        sets.push(SetOutput {
            set_key: key,
            probs: coherent,
        });
    }

    PipelineOutput {
        lambda_home,
        lambda_away,
        draw_structural,
        sets,
        warnings,
    }
}

enum HeuristicKind {
    HigherEntropy,
    UnderdogTilt,
    AntiFavorite,
    Balanced,
}

/// D-G are heuristic adjustments layered on top of C's market-weighted base
/// for behavioral portfolio coverage.
fn heuristic_set(after_temperature: Prob3, inputs: &FixtureInputs, kind: HeuristicKind) -> Prob3 {
    let base = stage5_blend(
        after_temperature,
        inputs.odds.as_ref(),
        inputs.alpha_model,
        0.35,
    );
    let adjusted = match kind {
        HeuristicKind::HigherEntropy => {
            // Soften further toward uniform than set C alone.
            stage4_temperature(base, (inputs.temperature * 1.25).clamp(0.8, 2.0))
        }
        HeuristicKind::UnderdogTilt => {
            let underdog = if base.home <= base.away {
                Outcome3::Home
            } else {
                Outcome3::Away
            };
            tilt(base, underdog, 0.04)
        }
        HeuristicKind::AntiFavorite => {
            let favorite = if base.home >= base.away {
                Outcome3::Home
            } else {
                Outcome3::Away
            };
            let other = if matches!(favorite, Outcome3::Home) {
                Outcome3::Away
            } else {
                Outcome3::Home
            };
            tilt(base, other, 0.04)
        }
        HeuristicKind::Balanced => stage4_temperature(base, 1.1_f64.clamp(0.8, 2.0)),
    };
    stage6_calibrate(
        adjusted,
        inputs.calibration.as_ref(),
        inputs.draw_calibration.as_ref(),
    )
}

enum Outcome3 {
    Home,
    Away,
}

/// Transfers `amount` of probability mass into the named side from the
/// other two sides proportionally, then renormalizes.
fn tilt(probs: Prob3, toward: Outcome3, amount: f64) -> Prob3 {
    let mut out = probs;
    match toward {
        Outcome3::Home => {
            let donor_sum = (out.draw + out.away).max(1e-9);
            out.draw -= amount * (out.draw / donor_sum);
            out.away -= amount * (out.away / donor_sum);
            out.home += amount;
        }
        Outcome3::Away => {
            let donor_sum = (out.draw + out.home).max(1e-9);
            out.draw -= amount * (out.draw / donor_sum);
            out.home -= amount * (out.home / donor_sum);
            out.away += amount;
        }
    }
    out.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs(odds: Option<Odds>) -> FixtureInputs {
        FixtureInputs {
            home: TeamInputs {
                attack: 1.2,
                defense: 0.9,
                used_fallback: false,
            },
            away: TeamInputs {
                attack: 1.0,
                defense: 1.0,
                used_fallback: false,
            },
            home_advantage: 0.3,
            rho: -0.1,
            league_avg_draw_rate: 0.26,
            odds,
            weather_factor: None,
            h2h_draw_rate: None,
            temperature: 1.0,
            alpha_model: 0.5,
            calibration: None,
            draw_calibration: None,
        }
    }

    #[test]
    fn every_set_sums_to_one() {
        let inputs = base_inputs(Some(Odds {
            home: 2.0,
            draw: 3.3,
            away: 3.8,
        }));
        let out = compute(&inputs, &SetKey::ALL);
        for set in &out.sets {
            assert!(
                set.probs.is_coherent(),
                "{:?} not coherent: {:?}",
                set.set_key,
                set.probs
            );
        }
    }

    #[test]
    fn draw_prior_keeps_draw_in_bounds() {
        let probs = stage2_draw_prior(Prob3::new(0.5, 0.05, 0.45), 0.32);
        assert!(probs.draw >= 0.12 && probs.draw <= 0.38);
        assert!((probs.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn draw_structural_compression_reduces_home_away_gap() {
        let inputs = base_inputs(Some(Odds {
            home: 2.6,
            draw: 2.9,
            away: 2.9,
        }));
        let after_prior =
            stage2_draw_prior(Prob3::new(0.4, 0.25, 0.35), inputs.league_avg_draw_rate);
        let before_gap = (after_prior.home - after_prior.away).abs();
        let (after_structural, components) = stage3_draw_structural(after_prior, 1.0, 1.0, &inputs);
        let after_gap = (after_structural.home - after_structural.away).abs();
        assert!(components.draw_signal >= 0.0);
        assert!(after_gap <= before_gap + 1e-9);
    }

    #[test]
    fn market_draw_monotonicity() {
        // Increasing market draw probability while holding other inputs
        // fixed should weakly increase the final p_D.
        let low_market = base_inputs(Some(Odds {
            home: 2.0,
            draw: 4.5,
            away: 3.5,
        }));
        let high_market = base_inputs(Some(Odds {
            home: 2.0,
            draw: 2.6,
            away: 3.5,
        }));
        let out_low = compute(&low_market, &[SetKey::A]);
        let out_high = compute(&high_market, &[SetKey::A]);
        assert!(out_high.sets[0].probs.draw >= out_low.sets[0].probs.draw - 1e-9);
    }

    #[test]
    fn temperature_above_one_softens_distribution() {
        let sharp = stage4_temperature(Prob3::new(0.7, 0.2, 0.1), 0.8);
        let soft = stage4_temperature(Prob3::new(0.7, 0.2, 0.1), 2.0);
        assert!(soft.normalized_entropy() > sharp.normalized_entropy());
    }
}
