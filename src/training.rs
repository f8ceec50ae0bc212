//! Model Training Service: Poisson team-strength MLE via iterative
//! proportional fitting, Dixon-Coles rho search, blending alpha search, and
//! isotonic calibration (including draw-only calibration from validation
//! results).
//!
//! The rho search is a brute-force brier-minimizing scan; small samples are
//! shrunk toward the default home advantage rather than trusted outright.

use std::collections::HashMap;

use crate::domain::{HistoricalMatch, IsotonicCurve, Outcome, Prob3, TeamStrength};
use crate::error::{EngineError, Result};
use crate::poisson;

pub const MIN_DRAW_CALIBRATION_SAMPLES: usize = 500;
const MIN_SHRINK_SAMPLES: f64 = 300.0;
pub const DEFAULT_XI: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct PoissonTrainingResult {
    pub strengths: HashMap<i64, TeamStrength>,
    pub home_advantage: f64,
    pub rho: f64,
    pub xi: f64,
    pub matches_used: usize,
}

fn time_decay_weight(days_ago: f64, xi: f64) -> f64 {
    (-xi * days_ago / 365.0).exp()
}

/// Iterative proportional fitting over goals-for/goals-against, with a
/// per-match time-decay weight. Converges when the max relative change in
/// any team's (attack, defense) falls below `tol`.
pub fn train_poisson(
    matches: &[HistoricalMatch],
    match_days_ago: &HashMap<i64, f64>,
    xi: f64,
    max_iters: usize,
) -> PoissonTrainingResult {
    let resolved: Vec<&HistoricalMatch> = matches.iter().filter(|m| m.is_resolved()).collect();

    let mut team_ids: Vec<i64> = Vec::new();
    for m in &resolved {
        if !team_ids.contains(&m.home_team_id) {
            team_ids.push(m.home_team_id);
        }
        if !team_ids.contains(&m.away_team_id) {
            team_ids.push(m.away_team_id);
        }
    }

    let mut attack: HashMap<i64, f64> = team_ids.iter().map(|&id| (id, 1.0)).collect();
    let mut defense: HashMap<i64, f64> = team_ids.iter().map(|&id| (id, 1.0)).collect();

    let weights: Vec<f64> = resolved
        .iter()
        .map(|m| time_decay_weight(match_days_ago.get(&m.id).copied().unwrap_or(0.0), xi))
        .collect();

    for _ in 0..max_iters {
        let mut max_rel_change = 0.0_f64;

        // Update attack ratings: attack_i proportional to goals scored vs.
        // expectation given opponents' defense.
        let mut goals_for: HashMap<i64, f64> = HashMap::new();
        let mut expected_for: HashMap<i64, f64> = HashMap::new();
        for (m, &w) in resolved.iter().zip(&weights) {
            let (Some(hg), Some(ag)) = (m.home_goals, m.away_goals) else {
                continue;
            };
            *goals_for.entry(m.home_team_id).or_insert(0.0) += w * hg as f64;
            *goals_for.entry(m.away_team_id).or_insert(0.0) += w * ag as f64;
            *expected_for.entry(m.home_team_id).or_insert(0.0) +=
                w * attack[&m.home_team_id] * defense[&m.away_team_id];
            *expected_for.entry(m.away_team_id).or_insert(0.0) +=
                w * attack[&m.away_team_id] * defense[&m.home_team_id];
        }
        for &id in &team_ids {
            let exp = expected_for.get(&id).copied().unwrap_or(0.0);
            if exp > 1e-9 {
                let target = goals_for.get(&id).copied().unwrap_or(0.0);
                let new_val = (attack[&id] * target / exp).clamp(0.05, 8.0);
                let rel = (new_val - attack[&id]).abs() / attack[&id].max(1e-6);
                max_rel_change = max_rel_change.max(rel);
                attack.insert(id, new_val);
            }
        }

        // Update defense ratings symmetrically against goals conceded.
        let mut goals_against: HashMap<i64, f64> = HashMap::new();
        let mut expected_against: HashMap<i64, f64> = HashMap::new();
        for (m, &w) in resolved.iter().zip(&weights) {
            let (Some(hg), Some(ag)) = (m.home_goals, m.away_goals) else {
                continue;
            };
            *goals_against.entry(m.home_team_id).or_insert(0.0) += w * ag as f64;
            *goals_against.entry(m.away_team_id).or_insert(0.0) += w * hg as f64;
            *expected_against.entry(m.home_team_id).or_insert(0.0) +=
                w * attack[&m.away_team_id] * defense[&m.home_team_id];
            *expected_against.entry(m.away_team_id).or_insert(0.0) +=
                w * attack[&m.home_team_id] * defense[&m.away_team_id];
        }
        for &id in &team_ids {
            let exp = expected_against.get(&id).copied().unwrap_or(0.0);
            if exp > 1e-9 {
                let target = goals_against.get(&id).copied().unwrap_or(0.0);
                let new_val = (defense[&id] * target / exp).clamp(0.05, 8.0);
                let rel = (new_val - defense[&id]).abs() / defense[&id].max(1e-6);
                max_rel_change = max_rel_change.max(rel);
                defense.insert(id, new_val);
            }
        }

        if max_rel_change < 1e-4 {
            break;
        }
    }

    normalize_mean_to_one(&mut attack);
    normalize_mean_to_one(&mut defense);

    let home_advantage = fit_home_advantage(&resolved);
    let rho = fit_dc_rho(&resolved, &attack, &defense, home_advantage);

    let strengths = team_ids
        .iter()
        .map(|&id| {
            (
                id,
                TeamStrength {
                    attack: attack[&id],
                    defense: defense[&id],
                },
            )
        })
        .collect();

    PoissonTrainingResult {
        strengths,
        home_advantage,
        rho,
        xi,
        matches_used: resolved.len(),
    }
}

fn normalize_mean_to_one(ratings: &mut HashMap<i64, f64>) {
    if ratings.is_empty() {
        return;
    }
    let mean = ratings.values().sum::<f64>() / ratings.len() as f64;
    if mean <= 0.0 {
        return;
    }
    for v in ratings.values_mut() {
        *v /= mean;
    }
}

fn fit_home_advantage(matches: &[&HistoricalMatch]) -> f64 {
    let mut n = 0usize;
    let mut sum_diff = 0.0_f64;
    for m in matches {
        let (Some(h), Some(a)) = (m.home_goals, m.away_goals) else {
            continue;
        };
        sum_diff += (h - a) as f64;
        n += 1;
    }
    if n == 0 {
        return 0.0;
    }
    let raw = sum_diff / n as f64;
    let w = (n as f64 / MIN_SHRINK_SAMPLES).clamp(0.0, 1.0);
    (raw * w).clamp(-0.6, 0.6)
}

/// Brute-force brier-minimizing scan over rho, using the fitted per-team
/// attack/defense strengths rather than a single league-wide lambda pair.
fn fit_dc_rho(
    matches: &[&HistoricalMatch],
    attack: &HashMap<i64, f64>,
    defense: &HashMap<i64, f64>,
    home_advantage: f64,
) -> f64 {
    let outcomes: Vec<(Outcome, f64, f64)> = matches
        .iter()
        .filter_map(|m| {
            let result = m.result()?;
            let a_h = *attack.get(&m.home_team_id)?;
            let d_h = *defense.get(&m.home_team_id)?;
            let a_a = *attack.get(&m.away_team_id)?;
            let d_a = *defense.get(&m.away_team_id)?;
            let (lh, la) = poisson::expected_goals(a_h, d_h, a_a, d_a, home_advantage);
            Some((result, lh, la))
        })
        .collect();

    if outcomes.is_empty() {
        return -0.10;
    }

    let mut best_rho = -0.10;
    let mut best_brier = f64::INFINITY;

    for rho_steps in -25..=5 {
        let rho = rho_steps as f64 / 100.0;
        let mut brier_sum = 0.0;
        for (result, lh, la) in &outcomes {
            let p = poisson::outcome_probs(*lh, *la, rho, poisson::MAX_GOALS);
            let y = one_hot(*result);
            brier_sum +=
                (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2);
        }
        let brier = brier_sum / outcomes.len() as f64;
        if brier < best_brier {
            best_brier = brier;
            best_rho = rho;
        }
    }

    best_rho
}

fn one_hot(outcome: Outcome) -> Prob3 {
    match outcome {
        Outcome::Home => Prob3::new(1.0, 0.0, 0.0),
        Outcome::Draw => Prob3::new(0.0, 1.0, 0.0),
        Outcome::Away => Prob3::new(0.0, 0.0, 1.0),
    }
}

/// Searches alpha in [0, 1] (0.01 steps) minimizing log-loss of
/// alpha*p_model + (1-alpha)*p_market over held-out matches.
pub fn train_blending(samples: &[(Prob3, Prob3, Outcome)]) -> f64 {
    if samples.is_empty() {
        return 0.5;
    }
    let mut best_alpha = 0.5;
    let mut best_loss = f64::INFINITY;
    for step in 0..=100 {
        let alpha = step as f64 / 100.0;
        let mut loss = 0.0;
        for (model, market, outcome) in samples {
            let blended = Prob3::new(
                alpha * model.home + (1.0 - alpha) * market.home,
                alpha * model.draw + (1.0 - alpha) * market.draw,
                alpha * model.away + (1.0 - alpha) * market.away,
            )
            .normalize();
            let p = blended.get(*outcome).clamp(1e-12, 1.0);
            loss -= p.ln();
        }
        if loss < best_loss {
            best_loss = loss;
            best_alpha = alpha;
        }
    }
    best_alpha
}

/// Pool-adjacent-violators isotonic regression: bins predicted probability
/// into `bins` buckets, computes the empirical outcome rate per bucket, then
/// pools adjacent buckets until the sequence is non-decreasing.
pub fn fit_isotonic(predicted: &[f64], actual_is_class: &[bool], bins: usize) -> IsotonicCurve {
    let bins = bins.max(2);
    if predicted.is_empty() || predicted.len() != actual_is_class.len() {
        return IsotonicCurve::identity();
    }

    let mut sum = vec![0.0_f64; bins];
    let mut count = vec![0.0_f64; bins];
    let mut x_sum = vec![0.0_f64; bins];
    for (&p, &is_class) in predicted.iter().zip(actual_is_class) {
        let idx = ((p.clamp(0.0, 1.0) * bins as f64).floor() as usize).min(bins - 1);
        sum[idx] += if is_class { 1.0 } else { 0.0 };
        count[idx] += 1.0;
        x_sum[idx] += p.clamp(0.0, 1.0);
    }

    // Pool-adjacent-violators on (weight, value) pairs, skipping empty bins.
    struct Block {
        weight: f64,
        value: f64,
        x: f64,
    }
    let mut blocks: Vec<Block> = Vec::new();
    for i in 0..bins {
        if count[i] <= 0.0 {
            continue;
        }
        blocks.push(Block {
            weight: count[i],
            value: sum[i] / count[i],
            x: x_sum[i] / count[i],
        });
    }
    if blocks.is_empty() {
        return IsotonicCurve::identity();
    }

    let mut i = 0;
    while i + 1 < blocks.len() {
        if blocks[i].value > blocks[i + 1].value {
            let merged_weight = blocks[i].weight + blocks[i + 1].weight;
            let merged_value = (blocks[i].value * blocks[i].weight
                + blocks[i + 1].value * blocks[i + 1].weight)
                / merged_weight;
            let merged_x = (blocks[i].x * blocks[i].weight
                + blocks[i + 1].x * blocks[i + 1].weight)
                / merged_weight;
            blocks[i] = Block {
                weight: merged_weight,
                value: merged_value,
                x: merged_x,
            };
            blocks.remove(i + 1);
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }

    let mut knots: Vec<(f64, f64)> = blocks.iter().map(|b| (b.x, b.value)).collect();
    knots.insert(0, (0.0, knots.first().map(|k| k.1).unwrap_or(0.0)));
    knots.push((1.0, knots.last().map(|k| k.1).unwrap_or(1.0)));
    IsotonicCurve { knots }
}

/// Draw-calibration training from validation results: requires at least
/// `MIN_DRAW_CALIBRATION_SAMPLES` exported (p_D_predicted, actual_is_draw)
/// pairs.
pub fn train_draw_calibration(
    predicted_draw: &[f64],
    actual_is_draw: &[bool],
) -> Result<IsotonicCurve> {
    if predicted_draw.len() < MIN_DRAW_CALIBRATION_SAMPLES {
        return Err(EngineError::InsufficientTrainingSamples {
            have: predicted_draw.len(),
            need: MIN_DRAW_CALIBRATION_SAMPLES,
        });
    }
    Ok(fit_isotonic(predicted_draw, actual_is_draw, 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_(id: i64, home: i64, away: i64, hg: i64, ag: i64) -> HistoricalMatch {
        HistoricalMatch {
            id,
            league_id: 1,
            home_team_id: home,
            away_team_id: away,
            match_date: "2024-01-01".to_string(),
            home_goals: Some(hg),
            away_goals: Some(ag),
            ht_home_goals: None,
            ht_away_goals: None,
            odds_home: None,
            odds_draw: None,
            odds_away: None,
            source_file: None,
            ingestion_batch_id: None,
        }
    }

    #[test]
    fn poisson_training_normalizes_mean_to_one() {
        let matches = vec![
            match_(1, 1, 2, 2, 0),
            match_(2, 2, 1, 1, 1),
            match_(3, 1, 3, 3, 1),
            match_(4, 3, 1, 0, 2),
            match_(5, 2, 3, 1, 1),
            match_(6, 3, 2, 2, 2),
        ];
        let result = train_poisson(&matches, &HashMap::new(), DEFAULT_XI, 50);
        let mean_attack: f64 = result.strengths.values().map(|s| s.attack).sum::<f64>()
            / result.strengths.len() as f64;
        assert!((mean_attack - 1.0).abs() < 1e-6);
        assert_eq!(result.matches_used, 6);
    }

    #[test]
    fn draw_calibration_requires_minimum_samples() {
        let err = train_draw_calibration(&[0.2, 0.3], &[false, true]).unwrap_err();
        matches!(err, EngineError::InsufficientTrainingSamples { .. });
    }

    #[test]
    fn isotonic_curve_is_nondecreasing() {
        let predicted: Vec<f64> = (0..1000).map(|i| (i % 100) as f64 / 100.0).collect();
        let actual: Vec<bool> = predicted.iter().map(|&p| p > 0.5).collect();
        let curve = fit_isotonic(&predicted, &actual, 10);
        for w in curve.knots.windows(2) {
            assert!(w[1].1 >= w[0].1 - 1e-9);
        }
    }

    #[test]
    fn blending_alpha_prefers_perfect_model() {
        let samples = vec![
            (
                Prob3::new(0.9, 0.05, 0.05),
                Prob3::new(0.4, 0.3, 0.3),
                Outcome::Home
            );
            20
        ];
        let alpha = train_blending(&samples);
        assert!(alpha > 0.5);
    }
}
