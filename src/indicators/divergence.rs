// =============================================================================
// Regular Divergence: two-point price vs. oscillator comparison
// =============================================================================
//
// Bearish: price prints a higher high while the oscillator prints a lower
//          high at the same two peaks.
// Bullish: price prints a lower low while the oscillator prints a higher low
//          at the same two troughs.
//
// Only the two most recent extrema inside the look-back window are compared.
// Peaks are checked first and win if both patterns are present.
// =============================================================================

use tracing::trace;

use crate::indicators::peaks::{find_peaks, find_troughs};
use crate::types::{Divergence, OscillatorSeries, PriceSeries};

pub const DEFAULT_LOOKBACK: usize = 30;
pub const DEFAULT_MIN_SEPARATION: usize = 5;

/// Classify the divergence in the last `lookback` bars of `series`.
///
/// `oscillator` must be aligned with `series` by position. Returns
/// [`Divergence::None`] when the oscillator is missing, either input is
/// shorter than `lookback`, or fewer than two extrema exist.
pub fn detect_divergence(
    series: &PriceSeries,
    oscillator: Option<&OscillatorSeries>,
    lookback: usize,
    min_separation: usize,
) -> Divergence {
    let Some(oscillator) = oscillator else {
        return Divergence::None;
    };
    if lookback == 0 || series.len() < lookback || oscillator.len() < lookback {
        return Divergence::None;
    }

    let bars = &series.bars()[series.len() - lookback..];
    let osc = &oscillator[oscillator.len() - lookback..];

    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let peaks = find_peaks(&highs, min_separation);
    if let [.., prior, last] = peaks[..] {
        let higher_high = highs[last] > highs[prior];
        if higher_high && osc_lower(osc[last], osc[prior]) {
            trace!(symbol = series.symbol(), timeframe = %series.timeframe(), prior, last, "bearish divergence");
            return Divergence::Bearish;
        }
    }

    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let troughs = find_troughs(&lows, min_separation);
    if let [.., prior, last] = troughs[..] {
        let lower_low = lows[last] < lows[prior];
        if lower_low && osc_lower(osc[prior], osc[last]) {
            trace!(symbol = series.symbol(), timeframe = %series.timeframe(), prior, last, "bullish divergence");
            return Divergence::Bullish;
        }
    }

    Divergence::None
}

/// `a < b` when both are defined.
fn osc_lower(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}
