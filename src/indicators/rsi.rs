// =============================================================================
// Relative Strength Index (RSI): exponentially weighted, OHLC proxy
// =============================================================================
//
// Step 1: Derive a price proxy per bar (OHLC4 or close).
// Step 2: First differences of the proxy; the first delta is treated as 0.
// Step 3: Split into gains = max(delta, 0) and losses = max(-delta, 0).
// Step 4: Exponentially weighted averages with alpha = 1 / period
//          (centre of mass period - 1), seeded with the first value:
//            avg_t = alpha * x_t + (1 - alpha) * avg_{t-1}
//          An average is only reported once `period` inputs are consumed.
// Step 5: RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//          avg_loss == 0 => 100 with gains, 50 on a flat market.
// =============================================================================

use crate::types::{OscillatorSeries, PriceProxy, PriceSeries};

/// Last oscillator value plus the full series aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub struct OscillatorOutput {
    pub last: f64,
    pub series: OscillatorSeries,
}

/// Compute the oscillator for `series`.
///
/// Returns `None` instead of failing whenever the input cannot support a
/// value: `period < 2`, fewer than `period + 1` bars, or any non-finite
/// proxy.
pub fn compute_oscillator(
    series: &PriceSeries,
    period: usize,
    proxy: PriceProxy,
) -> Option<OscillatorOutput> {
    if period < 2 || series.len() < period + 1 {
        return None;
    }

    let prices: Vec<f64> = series.bars().iter().map(|b| b.proxy(proxy)).collect();
    if prices.iter().any(|p| !p.is_finite()) {
        return None;
    }

    // --- Gains / losses ------------------------------------------------------
    let mut gains = Vec::with_capacity(prices.len());
    let mut losses = Vec::with_capacity(prices.len());
    gains.push(0.0);
    losses.push(0.0);
    for w in prices.windows(2) {
        let delta = w[1] - w[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let defined = |xs: &[f64]| xs.iter().filter(|x| x.is_finite()).count();
    if defined(&gains) < period || defined(&losses) < period {
        return None;
    }

    let avg_gains = ewm(&gains, period);
    let avg_losses = ewm(&losses, period);

    let series: OscillatorSeries = avg_gains
        .iter()
        .zip(&avg_losses)
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) => rsi_from_averages(*g, *l),
            _ => None,
        })
        .collect();

    let last = series.iter().rev().find_map(|v| *v)?;
    Some(OscillatorOutput { last, series })
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Exponentially weighted mean with `alpha = 1 / period`, no bias adjustment,
/// and a warm-up of `period` observations. Output is aligned with `xs`.
fn ewm(xs: &[f64], period: usize) -> Vec<Option<f64>> {
    let alpha = 1.0 / period as f64;
    let mut out = Vec::with_capacity(xs.len());
    let mut avg: Option<f64> = None;

    for (i, &x) in xs.iter().enumerate() {
        let next = match avg {
            None => x,
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
        };
        avg = Some(next);
        out.push(if i + 1 >= period { Some(next) } else { None });
    }

    out
}

/// Convert average gain / average loss into a value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 {
        if avg_gain > 0.0 {
            100.0
        } else {
            50.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}
