//! Draw-Signal Assembler: produces a normalized draw-likelihood signal in
//! [0,1] per fixture from
//! whichever of {low-total-goals, market draw prob, weather, H2H draw rate}
//! are available. Missing components do not fail; the signal is the mean of
//! whatever is present.

use crate::domain::DrawStructuralComponents;

#[derive(Debug, Clone, Default)]
pub struct DrawSignalInputs {
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub market_draw_prob: Option<f64>,
    pub weather_factor: Option<f64>,
    pub h2h_draw_rate: Option<f64>,
    pub league_draw_rate: Option<f64>,
}

/// Computes the [0,1] draw signal `s` and the `DrawStructuralComponents`
/// diagnostic record attached to predictions.
pub fn assemble(inputs: &DrawSignalInputs) -> (f64, DrawStructuralComponents) {
    let mut signals = Vec::new();

    let total_lambda = inputs.lambda_home + inputs.lambda_away;
    let low_total_signal = if total_lambda < 2.1 {
        0.8
    } else if total_lambda < 2.5 {
        0.6
    } else {
        0.4
    };
    signals.push(low_total_signal);

    if let Some(market) = inputs.market_draw_prob
        && market > 0.28
    {
        signals.push(0.7);
    }
    if let Some(weather) = inputs.weather_factor
        && weather > 0.6
    {
        signals.push(0.6);
    }
    if let Some(h2h) = inputs.h2h_draw_rate
        && h2h > 0.30
    {
        signals.push(0.5);
    }

    let s = signals.iter().sum::<f64>() / signals.len() as f64;

    let components = DrawStructuralComponents {
        draw_signal: s,
        market_draw_prob: inputs.market_draw_prob,
        weather_factor: inputs.weather_factor,
        h2h_draw_rate: inputs.h2h_draw_rate,
        league_draw_rate: inputs.league_draw_rate,
    };
    (s.clamp(0.0, 1.0), components)
}
