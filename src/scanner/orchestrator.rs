// =============================================================================
// Batch Orchestrator: symbols × timeframes → AnalysisReport
// =============================================================================
//
// Cells are processed sequentially, symbol-major, in input order. A failed
// fetch or a series too short for the oscillator yields a default cell; it
// never aborts the run. When the source is rate-limited, every call that
// actually reached the provider is followed by the configured delay.
// =============================================================================

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::error::DataError;
use crate::indicators::{compute_oscillator, detect_divergence};
use crate::market_data::DataSource;
use crate::runtime_config::AnalysisParams;
use crate::scanner::report::{AnalysisCell, AnalysisReport, ReportRow};
use crate::signals::classify;
use crate::types::{PriceSeries, TimeframeSpec};

/// Oscillator, divergence and classification for one series.
pub fn analyze_cell(series: &PriceSeries, params: &AnalysisParams) -> Result<AnalysisCell, DataError> {
    if series.is_empty() {
        return Err(DataError::Unavailable(format!(
            "{} {} has no bars",
            series.symbol(),
            series.timeframe()
        )));
    }
    let need = params.oscillator_period + 1;
    if series.len() < need {
        return Err(DataError::InsufficientHistory {
            have: series.len(),
            need,
        });
    }
    let output = compute_oscillator(series, params.oscillator_period, params.price_proxy)
        .ok_or_else(|| DataError::Malformed(format!("oscillator undefined for {}", series.symbol())))?;

    let divergence = detect_divergence(
        series,
        Some(&output.series),
        params.divergence_lookback,
        params.peak_min_separation,
    );

    Ok(AnalysisCell {
        last_value: Some(output.last),
        divergence,
        signal: classify(
            Some(output.last),
            params.oversold_threshold,
            params.overbought_threshold,
        ),
    })
}

/// Run one full scan.
///
/// `on_progress(done, total)` is called after every cell. The returned report
/// has one row per symbol in input order and one cell per timeframe label in
/// input order.
#[instrument(skip_all, fields(source = source.name(), symbols = symbols.len(), timeframes = timeframes.len()))]
pub async fn run_analysis<F>(
    symbols: &[String],
    timeframes: &[TimeframeSpec],
    source: &dyn DataSource,
    params: &AnalysisParams,
    mut on_progress: F,
) -> AnalysisReport
where
    F: FnMut(usize, usize) + Send,
{
    let total = symbols.len() * timeframes.len();
    let delay = if source.rate_limited() {
        params.inter_call_delay()
    } else {
        std::time::Duration::ZERO
    };
    info!(total, delay_secs = delay.as_secs_f64(), "scan started");

    let mut rows = Vec::with_capacity(symbols.len());
    let mut done = 0usize;
    let mut failures = 0usize;

    for symbol in symbols {
        let mut cells = IndexMap::with_capacity(timeframes.len());

        for tf in timeframes {
            let fetched = source.fetch(symbol, tf.key).await;
            let provider_called = fetched.provider_called;

            let cell = match fetched.series.and_then(|s| analyze_cell(&s, params)) {
                Ok(cell) => cell,
                Err(e @ DataError::InsufficientHistory { .. }) => {
                    failures += 1;
                    debug!(symbol = %symbol, timeframe = %tf.key, error = %e, "cell skipped");
                    AnalysisCell::unavailable()
                }
                Err(e) => {
                    failures += 1;
                    warn!(symbol = %symbol, timeframe = %tf.key, error = %e, "cell unavailable");
                    AnalysisCell::unavailable()
                }
            };
            debug!(
                symbol = %symbol,
                label = %tf.label,
                value = ?cell.last_value,
                divergence = %cell.divergence,
                signal = %cell.signal,
                "cell analysed"
            );
            cells.insert(tf.label.clone(), cell);

            done += 1;
            on_progress(done, total);

            if provider_called && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        rows.push(ReportRow {
            symbol: symbol.clone(),
            cells,
        });
    }

    info!(cells = total, failures, "scan finished");
    AnalysisReport {
        rows,
        completed_at: Utc::now(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::market_data::source::Fetched;
    use crate::market_data::CachedSource;
    use crate::types::{Divergence, PriceBar, SignalClass, Timeframe};

    const HOUR_MS: i64 = 3_600_000;

    struct StubSource {
        bars: HashMap<(String, Timeframe), Vec<PriceBar>>,
        rate_limited: bool,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(rate_limited: bool) -> Self {
            Self {
                bars: HashMap::new(),
                rate_limited,
                calls: AtomicUsize::new(0),
            }
        }

        fn with(mut self, symbol: &str, tf: Timeframe, bars: Vec<PriceBar>) -> Self {
            self.bars.insert((symbol.to_string(), tf), bars);
            self
        }
    }

    #[async_trait]
    impl DataSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }
        fn rate_limited(&self) -> bool {
            self.rate_limited
        }
        async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Fetched {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let series = match self.bars.get(&(symbol.to_string(), timeframe)) {
                Some(bars) => PriceSeries::new(symbol, timeframe, bars.clone()),
                None => Err(DataError::Unavailable(format!("{symbol} {timeframe}"))),
            };
            Fetched::from_provider(series)
        }
    }

    fn uptrend(n: usize) -> Vec<PriceBar> {
        (0..n)
            .map(|i| {
                let c = 1.0 + i as f64 * 0.01;
                PriceBar::new(i as i64 * HOUR_MS, c - 0.005, c + 0.002, c - 0.007, c)
            })
            .collect()
    }

    fn params_no_delay() -> AnalysisParams {
        AnalysisParams {
            inter_call_delay_secs: 0.0,
            ..AnalysisParams::default()
        }
    }

    fn tfs(list: &[Timeframe]) -> Vec<TimeframeSpec> {
        list.iter().copied().map(TimeframeSpec::from).collect()
    }

    #[tokio::test]
    async fn steady_uptrend_is_overbought_without_divergence() {
        let source = StubSource::new(false).with("EUR/USD", Timeframe::H1, uptrend(40));
        let report = run_analysis(
            &["EUR/USD".to_string()],
            &tfs(&[Timeframe::H1]),
            &source,
            &params_no_delay(),
            |_, _| {},
        )
        .await;

        let cell = report.rows[0].cells["H1"];
        assert!(cell.last_value.unwrap() > 80.0);
        assert_eq!(cell.signal, SignalClass::Overbought);
        assert_eq!(cell.divergence, Divergence::None);
    }

    #[tokio::test]
    async fn failures_yield_default_cells_in_order() {
        let source = StubSource::new(false)
            .with("EUR/USD", Timeframe::H1, uptrend(40))
            .with("GBP/USD", Timeframe::H1, uptrend(5));
        let symbols: Vec<String> = ["USD/JPY", "EUR/USD", "GBP/USD"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = run_analysis(
            &symbols,
            &tfs(&[Timeframe::H1, Timeframe::D1]),
            &source,
            &params_no_delay(),
            |_, _| {},
        )
        .await;

        let order: Vec<&str> = report.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["USD/JPY", "EUR/USD", "GBP/USD"]);
        for row in &report.rows {
            let labels: Vec<&String> = row.cells.keys().collect();
            assert_eq!(labels, vec!["H1", "Daily"]);
        }
        assert_eq!(report.rows[0].cells["H1"], AnalysisCell::unavailable());
        assert!(report.rows[1].cells["H1"].last_value.is_some());
        assert_eq!(report.rows[1].cells["Daily"], AnalysisCell::unavailable());
        // Five bars cannot seed a period-10 oscillator.
        assert_eq!(report.rows[2].cells["H1"], AnalysisCell::unavailable());
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn progress_reaches_total() {
        let source = StubSource::new(false);
        let mut seen = Vec::new();
        run_analysis(
            &["A/B".to_string(), "C/D".to_string()],
            &tfs(&[Timeframe::H1, Timeframe::W1]),
            &source,
            &params_no_delay(),
            |done, total| seen.push((done, total)),
        )
        .await;
        assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[tokio::test]
    async fn repeated_runs_give_identical_rows() {
        let source = StubSource::new(false).with("EUR/USD", Timeframe::H4, uptrend(60));
        let symbols = vec!["EUR/USD".to_string()];
        let timeframes = tfs(&[Timeframe::H4]);
        let params = params_no_delay();
        let a = run_analysis(&symbols, &timeframes, &source, &params, |_, _| {}).await;
        let b = run_analysis(&symbols, &timeframes, &source, &params, |_, _| {}).await;
        assert_eq!(a.rows, b.rows);
    }

    #[tokio::test]
    async fn custom_labels_become_columns() {
        let source = StubSource::new(false).with("EUR/USD", Timeframe::D1, uptrend(40));
        let timeframes = vec![TimeframeSpec {
            key: Timeframe::D1,
            label: "1D".into(),
        }];
        let report = run_analysis(
            &["EUR/USD".to_string()],
            &timeframes,
            &source,
            &params_no_delay(),
            |_, _| {},
        )
        .await;
        assert!(report.rows[0].cells.contains_key("1D"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_source_waits_after_each_call() {
        let source = StubSource::new(true);
        let params = AnalysisParams {
            inter_call_delay_secs: 13.0,
            ..AnalysisParams::default()
        };
        let start = tokio::time::Instant::now();
        run_analysis(
            &["A/B".to_string(), "C/D".to_string()],
            &tfs(&[Timeframe::H1, Timeframe::D1]),
            &source,
            &params,
            |_, _| {},
        )
        .await;
        assert_eq!(start.elapsed(), Duration::from_secs(4 * 13));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hits_skip_the_delay() {
        let stub = Arc::new(
            StubSource::new(true)
                .with("A/B", Timeframe::H1, uptrend(40))
                .with("C/D", Timeframe::H1, uptrend(40)),
        );
        let cached = CachedSource::new(stub.clone(), Duration::from_secs(3600));
        assert!(cached.rate_limited());

        let symbols = vec!["A/B".to_string(), "C/D".to_string()];
        let timeframes = tfs(&[Timeframe::H1]);
        let params = AnalysisParams {
            inter_call_delay_secs: 13.0,
            ..AnalysisParams::default()
        };

        let start = tokio::time::Instant::now();
        let first = run_analysis(&symbols, &timeframes, &cached, &params, |_, _| {}).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2 * 13));

        let start = tokio::time::Instant::now();
        let second = run_analysis(&symbols, &timeframes, &cached, &params, |_, _| {}).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.rows, second.rows);
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_source_never_waits() {
        let source = StubSource::new(false);
        let params = AnalysisParams {
            inter_call_delay_secs: 13.0,
            ..AnalysisParams::default()
        };
        let start = tokio::time::Instant::now();
        run_analysis(
            &["A/B".to_string()],
            &tfs(&[Timeframe::H1, Timeframe::D1]),
            &source,
            &params,
            |_, _| {},
        )
        .await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn empty_series_is_unavailable() {
        let series = PriceSeries::new("EUR/USD", Timeframe::H1, Vec::new()).unwrap();
        assert!(matches!(
            analyze_cell(&series, &AnalysisParams::default()),
            Err(DataError::Unavailable(_))
        ));
    }

    #[test]
    fn short_series_reports_insufficient_history() {
        let series = PriceSeries::new("EUR/USD", Timeframe::H1, uptrend(5)).unwrap();
        assert_eq!(
            analyze_cell(&series, &AnalysisParams::default()),
            Err(DataError::InsufficientHistory { have: 5, need: 11 })
        );
    }

    #[test]
    fn analyze_cell_matches_classifier() {
        let series = PriceSeries::new("EUR/USD", Timeframe::H1, uptrend(40)).unwrap();
        let params = AnalysisParams {
            overbought_threshold: 99.9,
            ..AnalysisParams::default()
        };
        let cell = analyze_cell(&series, &params).unwrap();
        let v = cell.last_value.unwrap();
        let expected = if v >= 99.9 {
            SignalClass::Overbought
        } else {
            SignalClass::Neutral
        };
        assert_eq!(cell.signal, expected);
    }
}
