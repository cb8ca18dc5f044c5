// =============================================================================
// H1 -> H4 resampling
// =============================================================================
//
// Providers without a native 4-hour interval are served by grouping hourly
// bars into 4-hour UTC buckets aligned to midnight:
//   open = first, high = max, low = min, close = last
// A bucket is labelled with its start time. Gaps inside the series produce
// buckets with fewer bars and are kept; an incomplete trailing bucket is
// still forming and is dropped.
// =============================================================================

use crate::error::DataError;
use crate::types::{PriceBar, PriceSeries, Timeframe};

const HOUR_MS: i64 = 3_600_000;
const BUCKET_MS: i64 = 4 * HOUR_MS;
const BARS_PER_BUCKET: usize = 4;

/// Aggregate an hourly series into 4-hour bars.
pub fn resample_h1_to_h4(hourly: &PriceSeries) -> Result<PriceSeries, DataError> {
    let mut out: Vec<PriceBar> = Vec::with_capacity(hourly.len() / BARS_PER_BUCKET + 1);
    let mut current: Option<(i64, PriceBar, usize)> = None;

    for bar in hourly.bars() {
        let bucket = bar.timestamp.div_euclid(BUCKET_MS);
        current = match current.take() {
            Some((key, mut agg, count)) if key == bucket => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                Some((key, agg, count + 1))
            }
            Some((_, agg, _)) => {
                out.push(agg);
                Some((bucket, start_bucket(bucket, bar), 1))
            }
            None => Some((bucket, start_bucket(bucket, bar), 1)),
        };
    }

    if let Some((_, agg, count)) = current {
        if count >= BARS_PER_BUCKET {
            out.push(agg);
        }
    }

    PriceSeries::new(hourly.symbol(), Timeframe::H4, out)
}

fn start_bucket(bucket: i64, bar: &PriceBar) -> PriceBar {
    PriceBar::new(bucket * BUCKET_MS, bar.open, bar.high, bar.low, bar.close)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(start_hour: i64, prices: &[(f64, f64, f64, f64)]) -> PriceSeries {
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| PriceBar::new((start_hour + i as i64) * HOUR_MS, o, h, l, c))
            .collect();
        PriceSeries::new("EUR/USD", Timeframe::H1, bars).unwrap()
    }

    #[test]
    fn aggregates_first_max_min_last() {
        let s = hourly(
            0,
            &[
                (1.0, 1.5, 0.9, 1.2),
                (1.2, 1.8, 1.1, 1.3),
                (1.3, 1.4, 0.7, 1.0),
                (1.0, 1.1, 0.95, 1.05),
            ],
        );
        let h4 = resample_h1_to_h4(&s).unwrap();
        assert_eq!(h4.timeframe(), Timeframe::H4);
        assert_eq!(h4.len(), 1);
        let b = h4.bars()[0];
        assert_eq!(b.timestamp, 0);
        assert_eq!((b.open, b.high, b.low, b.close), (1.0, 1.8, 0.7, 1.05));
    }

    #[test]
    fn incomplete_trailing_bucket_is_dropped() {
        let s = hourly(0, &[(1.0, 1.0, 1.0, 1.0); 10]);
        let h4 = resample_h1_to_h4(&s).unwrap();
        assert_eq!(h4.len(), 2);
        assert_eq!(h4.bars()[1].timestamp, BUCKET_MS);
    }

    #[test]
    fn buckets_align_to_midnight_not_first_bar() {
        // Starts at 02:00 => first bucket (00:00-04:00) holds two bars only
        // but is not trailing, so it is kept.
        let s = hourly(2, &[(1.0, 1.0, 1.0, 1.0); 6]);
        let h4 = resample_h1_to_h4(&s).unwrap();
        let ts: Vec<i64> = h4.bars().iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![0, BUCKET_MS]);
    }

    #[test]
    fn empty_input_gives_empty_series() {
        let s = hourly(0, &[]);
        assert!(resample_h1_to_h4(&s).unwrap().is_empty());
    }
}
