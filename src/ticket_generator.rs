//! Ticket Generator: builds a single jackpot ticket (one pick per fixture)
//! from a probability set, honoring role-specific (A-G) portfolio
//! constraints, late-shock hedging, and correlation breaking. Infeasible
//! constraint combinations are relaxed in a fixed order and every relaxation
//! is recorded in the returned diagnostics rather than silently dropped.

use crate::domain::{Outcome, Prob3, SetKey};
use crate::late_shock::ShockAssessment;

const FAVORITE_THRESHOLD: f64 = 0.65;
const UNDERDOG_THRESHOLD: f64 = 0.25;
const HEDGE_DRAW_THRESHOLD: f64 = 0.25;
const CORRELATION_BREAK_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct TicketConstraints {
    pub min_draws: usize,
    pub max_draws: usize,
    pub max_favorites: usize,
    pub min_underdogs: usize,
    pub entropy_min: f64,
    pub entropy_max: f64,
}

impl TicketConstraints {
    /// Role-specific defaults. C (market-weighted) leans hardest on
    /// favorites and never requires an underdog pick; E/F/G cap favorites
    /// tightly and require the most underdog picks, widening entropy along
    /// the way.
    pub fn for_set(set_key: SetKey, fixture_count: usize) -> Self {
        let base_draws = (fixture_count as f64 * 0.20).round() as usize;
        match set_key {
            SetKey::A | SetKey::B => Self {
                min_draws: base_draws.saturating_sub(1),
                max_draws: base_draws + 2,
                max_favorites: (fixture_count * 2) / 3,
                min_underdogs: fixture_count / 6,
                entropy_min: 0.0,
                entropy_max: 1.0,
            },
            SetKey::C => Self {
                min_draws: base_draws.saturating_sub(1),
                max_draws: base_draws + 1,
                max_favorites: fixture_count,
                min_underdogs: 0,
                entropy_min: 0.0,
                entropy_max: 1.0,
            },
            SetKey::D => Self {
                min_draws: base_draws,
                max_draws: base_draws + 3,
                max_favorites: fixture_count / 2,
                min_underdogs: fixture_count / 4,
                entropy_min: 0.4,
                entropy_max: 1.0,
            },
            SetKey::E | SetKey::F | SetKey::G => Self {
                min_draws: base_draws,
                max_draws: base_draws + 3,
                max_favorites: fixture_count / 3,
                min_underdogs: fixture_count / 3,
                entropy_min: 0.3,
                entropy_max: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicketDiagnostics {
    pub relaxations_applied: Vec<String>,
    pub correlation_breaks: usize,
    pub hedged_fixtures: Vec<usize>,
    pub entropy: f64,
    pub draw_count: usize,
}

#[derive(Debug, Clone)]
pub struct Ticket {
    pub set_key: SetKey,
    pub picks: Vec<Outcome>,
    pub diagnostics: TicketDiagnostics,
}

struct FixtureConfidences {
    probs: Prob3,
    set_a_probs: Prob3,
    /// Some(outcome) when set A's probability for `outcome` clears the
    /// favorite threshold; at most one outcome can qualify.
    favorite: Option<Outcome>,
}

fn confidence(probs: &Prob3, set_a_probs: &Prob3) -> FixtureConfidences {
    let argmax = set_a_probs.argmax();
    let favorite = (set_a_probs.get(argmax) >= FAVORITE_THRESHOLD).then_some(argmax);
    FixtureConfidences {
        probs: *probs,
        set_a_probs: *set_a_probs,
        favorite,
    }
}

fn is_underdog_side(set_a_probs: &Prob3, outcome: Outcome) -> bool {
    outcome != Outcome::Draw && set_a_probs.get(outcome) <= UNDERDOG_THRESHOLD
}

fn binary_entropy(p: f64) -> f64 {
    let p = p.clamp(1e-9, 1.0 - 1e-9);
    let q = 1.0 - p;
    -(p * p.log2() + q * q.log2())
}

fn ticket_entropy(picks: &[Outcome], confidences: &[FixtureConfidences]) -> f64 {
    let mean_p = picks
        .iter()
        .zip(confidences)
        .map(|(p, c)| c.probs.get(*p))
        .sum::<f64>()
        / picks.len().max(1) as f64;
    binary_entropy(mean_p)
}

/// Generates a ticket. `probs` is the role's own probability set, used to
/// seed picks and to judge draw confidence; `set_a_probs` is always set A's
/// probabilities, used to define "favorite" and "underdog" per fixture
/// regardless of which set the role actually bets on. `shocks[i]` is the
/// late-shock assessment for fixture `i`, if one was computed; absent
/// entries are treated as not triggered.
pub fn generate(
    set_key: SetKey,
    probs: &[Prob3],
    set_a_probs: &[Prob3],
    shocks: &[Option<ShockAssessment>],
    correlation: &[Vec<f64>],
) -> Ticket {
    let n = probs.len();
    let mut constraints = TicketConstraints::for_set(set_key, n);
    let confidences: Vec<FixtureConfidences> = probs
        .iter()
        .zip(set_a_probs)
        .map(|(p, a)| confidence(p, a))
        .collect();

    let mut picks: Vec<Outcome> = probs.iter().map(|p| p.argmax()).collect();
    let mut diagnostics = TicketDiagnostics::default();

    let relaxation_order = [
        "entropy_range",
        "min_underdogs",
        "max_favorites",
        "max_draws",
        "min_draws",
    ];
    let mut relax_idx = 0;
    let max_iterations = (n + 1) * relaxation_order.len();

    for _ in 0..max_iterations {
        let draw_count = picks.iter().filter(|p| **p == Outcome::Draw).count();
        let favorite_count = picks
            .iter()
            .zip(&confidences)
            .filter(|(p, c)| c.favorite == Some(**p))
            .count();
        let underdog_count = picks
            .iter()
            .zip(&confidences)
            .filter(|(p, c)| is_underdog_side(&c.set_a_probs, **p))
            .count();

        let feasible = draw_count >= constraints.min_draws
            && draw_count <= constraints.max_draws
            && favorite_count <= constraints.max_favorites
            && underdog_count >= constraints.min_underdogs;

        if feasible {
            break;
        }

        let before = picks.clone();
        if draw_count < constraints.min_draws {
            promote_to_draw(&mut picks, &confidences);
        } else if draw_count > constraints.max_draws {
            demote_from_draw(&mut picks, &confidences);
        }
        if favorite_count > constraints.max_favorites {
            demote_from_favorite(&mut picks, &confidences);
        }
        if underdog_count < constraints.min_underdogs {
            promote_to_underdog(&mut picks, &confidences);
        }

        // No candidate fixture could be adjusted under the current
        // constraints: relax one, in the fixed order, and try again.
        if picks == before {
            if relax_idx >= relaxation_order.len() {
                break;
            }
            let field = relaxation_order[relax_idx];
            relax_one(&mut constraints, field);
            diagnostics.relaxations_applied.push(field.to_string());
            relax_idx += 1;
        }
    }

    if matches!(set_key, SetKey::F | SetKey::G) {
        for (i, shock) in shocks.iter().enumerate() {
            if let Some(s) = shock
                && s.triggered
            {
                hedge_fixture(&mut picks, i, &confidences[i].set_a_probs);
                diagnostics.hedged_fixtures.push(i);
            }
        }
    }

    break_correlations(&mut picks, correlation, &mut diagnostics);

    adjust_entropy(&mut picks, &confidences, &constraints, &mut diagnostics);
    diagnostics.draw_count = picks.iter().filter(|p| **p == Outcome::Draw).count();

    Ticket {
        set_key,
        picks,
        diagnostics,
    }
}

/// Returns the next-best outcome by `probs` that isn't `favorite`. Used by
/// the portfolio-level favorite-hedge invariant to mutate a ticket's pick
/// without re-running the whole per-ticket pipeline.
pub fn next_best_non_favorite(probs: &Prob3, favorite: Outcome) -> Outcome {
    let mut ranked = [Outcome::Home, Outcome::Draw, Outcome::Away];
    ranked.sort_by(|a, b| probs.get(*b).partial_cmp(&probs.get(*a)).unwrap());
    ranked.into_iter().find(|o| *o != favorite).unwrap_or(favorite)
}

fn relax_one(constraints: &mut TicketConstraints, field: &str) {
    match field {
        "entropy_range" => {
            constraints.entropy_min = 0.0;
            constraints.entropy_max = 1.0;
        }
        "min_underdogs" => constraints.min_underdogs = constraints.min_underdogs.saturating_sub(1),
        "max_favorites" => constraints.max_favorites += 2,
        "max_draws" => constraints.max_draws += 1,
        "min_draws" => constraints.min_draws = constraints.min_draws.saturating_sub(1),
        _ => {}
    }
}

/// Hedges a shock-flagged fixture to "X" if set A still rates the draw
/// plausible, else to the weaker of home/away by set A.
fn hedge_fixture(picks: &mut [Outcome], idx: usize, set_a_probs: &Prob3) {
    picks[idx] = if set_a_probs.draw > HEDGE_DRAW_THRESHOLD {
        Outcome::Draw
    } else if set_a_probs.home >= set_a_probs.away {
        Outcome::Away
    } else {
        Outcome::Home
    };
}

/// Flips the higher-indexed fixture of any pair whose correlation clears
/// the threshold and whose picks still match, processed in descending
/// correlation order, at most one flip per fixture pair and at most `n`
/// flips total.
fn break_correlations(picks: &mut [Outcome], correlation: &[Vec<f64>], diagnostics: &mut TicketDiagnostics) {
    let n = picks.len();
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if i < correlation.len() && j < correlation[i].len() && correlation[i][j] > CORRELATION_BREAK_THRESHOLD {
                pairs.push((i, j, correlation[i][j]));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());

    let mut flips = 0;
    for (i, j, _) in pairs {
        if flips >= n {
            break;
        }
        if picks[i] == picks[j] {
            picks[j] = if picks[j] != Outcome::Draw {
                Outcome::Draw
            } else {
                opposite_side(picks[j])
            };
            diagnostics.correlation_breaks += 1;
            flips += 1;
        }
    }
}

fn opposite_side(pick: Outcome) -> Outcome {
    match pick {
        Outcome::Home => Outcome::Away,
        Outcome::Away => Outcome::Home,
        Outcome::Draw => Outcome::Draw,
    }
}

/// Nudges ticket entropy into range, at most one fixture flipped per
/// iteration, at most `n` iterations.
fn adjust_entropy(
    picks: &mut [Outcome],
    confidences: &[FixtureConfidences],
    constraints: &TicketConstraints,
    diagnostics: &mut TicketDiagnostics,
) {
    let n = picks.len();
    for _ in 0..n {
        let entropy = ticket_entropy(picks, confidences);
        if entropy < constraints.entropy_min {
            let candidates: Vec<usize> = (0..n).filter(|&i| picks[i] != Outcome::Draw).collect();
            let Some(&idx) = candidates
                .iter()
                .max_by(|&&a, &&b| confidences[a].probs.draw.partial_cmp(&confidences[b].probs.draw).unwrap())
            else {
                break;
            };
            picks[idx] = Outcome::Draw;
        } else if entropy > constraints.entropy_max {
            let candidates: Vec<usize> = (0..n).filter(|&i| picks[i] == Outcome::Draw).collect();
            let Some(&idx) = candidates
                .iter()
                .min_by(|&&a, &&b| confidences[a].probs.draw.partial_cmp(&confidences[b].probs.draw).unwrap())
            else {
                break;
            };
            let c = &confidences[idx];
            picks[idx] = if c.probs.home >= c.probs.away {
                Outcome::Home
            } else {
                Outcome::Away
            };
        } else {
            break;
        }
    }
    diagnostics.entropy = ticket_entropy(picks, confidences);
}

fn promote_to_draw(picks: &mut [Outcome], confidences: &[FixtureConfidences]) {
    let mut candidates: Vec<usize> = (0..picks.len())
        .filter(|&i| picks[i] != Outcome::Draw)
        .collect();
    candidates.sort_by(|&a, &b| {
        confidences[a]
            .probs
            .draw
            .partial_cmp(&confidences[b].probs.draw)
            .unwrap()
            .reverse()
    });
    if let Some(&idx) = candidates.first() {
        picks[idx] = Outcome::Draw;
    }
}

fn demote_from_draw(picks: &mut [Outcome], confidences: &[FixtureConfidences]) {
    let mut candidates: Vec<usize> = (0..picks.len())
        .filter(|&i| picks[i] == Outcome::Draw)
        .collect();
    candidates.sort_by(|&a, &b| {
        confidences[a]
            .probs
            .draw
            .partial_cmp(&confidences[b].probs.draw)
            .unwrap()
    });
    if let Some(&idx) = candidates.first() {
        let c = &confidences[idx];
        picks[idx] = if c.probs.home >= c.probs.away {
            Outcome::Home
        } else {
            Outcome::Away
        };
    }
}

/// Demotes the least-confident favorite pick to its next-best non-favorite
/// outcome (by the role's own probability set).
fn demote_from_favorite(picks: &mut [Outcome], confidences: &[FixtureConfidences]) {
    let mut candidates: Vec<usize> = (0..picks.len())
        .filter(|&i| confidences[i].favorite == Some(picks[i]))
        .collect();
    candidates.sort_by(|&a, &b| {
        confidences[a]
            .set_a_probs
            .get(picks[a])
            .partial_cmp(&confidences[b].set_a_probs.get(picks[b]))
            .unwrap()
    });
    if let Some(&idx) = candidates.first() {
        let favorite = confidences[idx].favorite.unwrap();
        let mut ranked = [Outcome::Home, Outcome::Draw, Outcome::Away];
        ranked.sort_by(|a, b| {
            confidences[idx]
                .probs
                .get(*b)
                .partial_cmp(&confidences[idx].probs.get(*a))
                .unwrap()
        });
        if let Some(alt) = ranked.into_iter().find(|o| *o != favorite) {
            picks[idx] = alt;
        }
    }
}

/// Promotes the fixture with the strongest qualifying underdog side (lowest
/// set-A probability on that side) that isn't already picked as one.
fn promote_to_underdog(picks: &mut [Outcome], confidences: &[FixtureConfidences]) {
    let mut best: Option<(usize, Outcome, f64)> = None;
    for (i, c) in confidences.iter().enumerate() {
        for side in [Outcome::Home, Outcome::Away] {
            if picks[i] == side || !is_underdog_side(&c.set_a_probs, side) {
                continue;
            }
            let p = c.set_a_probs.get(side);
            if best.as_ref().map(|(_, _, bp)| p < *bp).unwrap_or(true) {
                best = Some((i, side, p));
            }
        }
    }
    if let Some((idx, side, _)) = best {
        picks[idx] = side;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_probs(n: usize) -> Vec<Prob3> {
        (0..n)
            .map(|i| {
                if i % 3 == 0 {
                    Prob3::new(0.70, 0.20, 0.10)
                } else if i % 3 == 1 {
                    Prob3::new(0.30, 0.40, 0.30)
                } else {
                    Prob3::new(0.20, 0.20, 0.60)
                }
            })
            .collect()
    }

    #[test]
    fn ticket_has_one_pick_per_fixture() {
        let probs = sample_probs(14);
        let shocks = vec![None; 14];
        let correlation = vec![vec![0.0; 14]; 14];
        let ticket = generate(SetKey::A, &probs, &probs, &shocks, &correlation);
        assert_eq!(ticket.picks.len(), 14);
    }

    #[test]
    fn draw_heavy_role_d_relaxes_when_infeasible() {
        let probs = vec![Prob3::new(0.9, 0.05, 0.05); 10];
        let shocks = vec![None; 10];
        let correlation = vec![vec![0.0; 10]; 10];
        let ticket = generate(SetKey::D, &probs, &probs, &shocks, &correlation);
        assert_eq!(ticket.picks.len(), 10);
    }

    #[test]
    fn correlated_fixtures_get_broken() {
        let probs = vec![Prob3::new(0.6, 0.2, 0.2); 2];
        let shocks = vec![None; 2];
        let correlation = vec![vec![1.0, 0.95], vec![0.95, 1.0]];
        let ticket = generate(SetKey::A, &probs, &probs, &shocks, &correlation);
        assert_eq!(ticket.picks.len(), 2);
        assert_ne!(ticket.picks[0], ticket.picks[1]);
    }

    #[test]
    fn favorite_requires_set_a_threshold_not_argmax() {
        // argmax is Home (0.5) but set A never clears 0.65, so no fixture
        // should be treated as having a favorite to cap.
        let probs = vec![Prob3::new(0.5, 0.3, 0.2); 6];
        let shocks = vec![None; 6];
        let correlation = vec![vec![0.0; 6]; 6];
        let ticket = generate(SetKey::E, &probs, &probs, &shocks, &correlation);
        assert_eq!(ticket.picks.len(), 6);
    }

    #[test]
    fn hedge_prefers_draw_when_set_a_draw_plausible() {
        let set_a = Prob3::new(0.5, 0.3, 0.2);
        let mut picks = [Outcome::Home];
        hedge_fixture(&mut picks, 0, &set_a);
        assert_eq!(picks[0], Outcome::Draw);
    }

    #[test]
    fn hedge_flips_to_non_favorite_side_when_draw_implausible() {
        let set_a = Prob3::new(0.7, 0.1, 0.2);
        let mut picks = [Outcome::Home];
        hedge_fixture(&mut picks, 0, &set_a);
        assert_eq!(picks[0], Outcome::Away);
    }
}
