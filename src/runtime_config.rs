// =============================================================================
// Runtime Configuration: scanner settings with atomic save
// =============================================================================
//
// Every tunable the scanner reads lives here. All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an older
// config file. `validate()` must pass before a scan is started; a bad config is
// an operator error and is reported instead of being patched over.
// =============================================================================

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::indicators::divergence::{DEFAULT_LOOKBACK, DEFAULT_MIN_SEPARATION};
use crate::types::{PriceProxy, Timeframe, TimeframeSpec};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    [
        "EUR/USD", "USD/JPY", "GBP/USD", "USD/CHF", "AUD/USD", "USD/CAD", "NZD/USD", "EUR/JPY",
        "GBP/JPY", "AUD/JPY", "NZD/JPY", "CAD/JPY", "CHF/JPY", "EUR/GBP", "EUR/AUD", "EUR/CAD",
        "EUR/NZD", "EUR/CHF",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_timeframes() -> Vec<TimeframeSpec> {
    [Timeframe::H1, Timeframe::H4, Timeframe::D1, Timeframe::W1]
        .into_iter()
        .map(TimeframeSpec::from)
        .collect()
}

fn default_oscillator_period() -> usize {
    10
}

fn default_oversold_threshold() -> f64 {
    20.0
}

fn default_overbought_threshold() -> f64 {
    80.0
}

fn default_divergence_lookback() -> usize {
    DEFAULT_LOOKBACK
}

fn default_peak_min_separation() -> usize {
    DEFAULT_MIN_SEPARATION
}

/// 5 calls/minute => 12 s, plus a one-second margin.
fn default_inter_call_delay_secs() -> f64 {
    13.0
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_binance_kline_limit() -> u32 {
    200
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

// =============================================================================
// DataSourceKind
// =============================================================================

/// Which market-data provider backs the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    AlphaVantage,
    Binance,
    Files,
}

impl Default for DataSourceKind {
    fn default() -> Self {
        Self::AlphaVantage
    }
}

impl DataSourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alpha_vantage" | "alphavantage" => Some(Self::AlphaVantage),
            "binance" => Some(Self::Binance),
            "files" | "file" => Some(Self::Files),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlphaVantage => write!(f, "alpha_vantage"),
            Self::Binance => write!(f, "binance"),
            Self::Files => write!(f, "files"),
        }
    }
}

// =============================================================================
// AnalysisParams
// =============================================================================

/// Indicator and throttling parameters consumed by a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Oscillator smoothing period (>= 2).
    #[serde(default = "default_oscillator_period")]
    pub oscillator_period: usize,

    /// Values at or below this are oversold.
    #[serde(default = "default_oversold_threshold")]
    pub oversold_threshold: f64,

    /// Values at or above this are overbought.
    #[serde(default = "default_overbought_threshold")]
    pub overbought_threshold: f64,

    /// Bars inspected by the divergence detector.
    #[serde(default = "default_divergence_lookback")]
    pub divergence_lookback: usize,

    /// Minimum distance in bars between two accepted extrema.
    #[serde(default = "default_peak_min_separation")]
    pub peak_min_separation: usize,

    #[serde(default)]
    pub price_proxy: PriceProxy,

    /// Wait after each provider call of a rate-limited source. 0 disables.
    #[serde(default = "default_inter_call_delay_secs")]
    pub inter_call_delay_secs: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            oscillator_period: default_oscillator_period(),
            oversold_threshold: default_oversold_threshold(),
            overbought_threshold: default_overbought_threshold(),
            divergence_lookback: default_divergence_lookback(),
            peak_min_separation: default_peak_min_separation(),
            price_proxy: PriceProxy::default(),
            inter_call_delay_secs: default_inter_call_delay_secs(),
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oscillator_period < 2 {
            return Err(ConfigError::Period(self.oscillator_period));
        }
        for (name, value) in [
            ("oversold_threshold", self.oversold_threshold),
            ("overbought_threshold", self.overbought_threshold),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdRange { name, value });
            }
        }
        if self.oversold_threshold >= self.overbought_threshold {
            return Err(ConfigError::InvertedThresholds {
                oversold: self.oversold_threshold,
                overbought: self.overbought_threshold,
            });
        }
        if self.divergence_lookback < 3 {
            return Err(ConfigError::Lookback(self.divergence_lookback));
        }
        if self.peak_min_separation < 1 {
            return Err(ConfigError::PeakSeparation(self.peak_min_separation));
        }
        if !self.inter_call_delay_secs.is_finite() || self.inter_call_delay_secs < 0.0 {
            return Err(ConfigError::Delay(self.inter_call_delay_secs));
        }
        Ok(())
    }

    pub fn inter_call_delay(&self) -> std::time::Duration {
        if self.inter_call_delay_secs.is_finite() && self.inter_call_delay_secs > 0.0 {
            std::time::Duration::from_secs_f64(self.inter_call_delay_secs)
        } else {
            std::time::Duration::ZERO
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Universe -----------------------------------------------------------

    /// Symbols in `BASE/QUOTE` form, scanned and reported in this order.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Timeframes in report column order.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<TimeframeSpec>,

    // --- Analysis -----------------------------------------------------------

    #[serde(flatten)]
    pub analysis: AnalysisParams,

    // --- Data source --------------------------------------------------------

    #[serde(default)]
    pub data_source: DataSourceKind,

    /// Root directory for the `files` data source.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Bars requested per Binance klines call.
    #[serde(default = "default_binance_kline_limit")]
    pub binance_kline_limit: u32,

    /// Response cache lifetime. 0 disables the cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Scheduled rescan period. 0 means rescans only happen on request.
    #[serde(default)]
    pub rescan_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframes: default_timeframes(),
            analysis: AnalysisParams::default(),
            data_source: DataSourceKind::default(),
            data_dir: default_data_dir(),
            binance_kline_limit: default_binance_kline_limit(),
            cache_ttl_secs: default_cache_ttl_secs(),
            rescan_interval_secs: 0,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = config.symbols.len(),
            data_source = %config.data_source,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration with an atomic write (tmp file, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise scanner config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "scanner config saved (atomic)");
        Ok(())
    }

    /// Apply `SCANNER_SYMBOLS`, `SCANNER_TIMEFRAMES` and `SCANNER_DATA_SOURCE`
    /// if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(syms) = std::env::var("SCANNER_SYMBOLS") {
            let parsed: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.symbols = parsed;
            }
        }
        if let Ok(tfs) = std::env::var("SCANNER_TIMEFRAMES") {
            let parsed: Vec<TimeframeSpec> = tfs
                .split(',')
                .filter_map(|s| Timeframe::parse(s.trim()))
                .map(TimeframeSpec::from)
                .collect();
            if !parsed.is_empty() {
                self.timeframes = parsed;
            }
        }
        if let Ok(kind) = std::env::var("SCANNER_DATA_SOURCE") {
            if let Some(kind) = DataSourceKind::parse(&kind) {
                self.data_source = kind;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if self.timeframes.is_empty() {
            return Err(ConfigError::NoTimeframes);
        }
        let mut seen = HashSet::new();
        for tf in &self.timeframes {
            if !seen.insert(tf.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(tf.label.clone()));
            }
        }
        self.analysis.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbols.len(), 18);
        assert_eq!(cfg.symbols[0], "EUR/USD");
        assert_eq!(cfg.timeframes.len(), 4);
        assert_eq!(cfg.timeframes[2].label, "Daily");
        assert_eq!(cfg.analysis.oscillator_period, 10);
        assert_eq!(cfg.analysis.price_proxy, PriceProxy::Ohlc4);
        assert!((cfg.analysis.inter_call_delay_secs - 13.0).abs() < f64::EPSILON);
        assert_eq!(cfg.data_source, DataSourceKind::AlphaVantage);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.analysis.divergence_lookback, DEFAULT_LOOKBACK);
        assert_eq!(cfg.analysis.peak_min_separation, DEFAULT_MIN_SEPARATION);
        assert_eq!((DEFAULT_LOOKBACK, DEFAULT_MIN_SEPARATION), (30, 5));
        assert_eq!(cfg.cache_ttl_secs, 3600);
        assert_eq!(cfg.rescan_interval_secs, 0);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "symbols": ["BTC/USDT"],
            "oscillator_period": 14,
            "price_proxy": "close",
            "data_source": "binance",
            "timeframes": [{ "key": "D1", "label": "1D" }]
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["BTC/USDT"]);
        assert_eq!(cfg.analysis.oscillator_period, 14);
        assert_eq!(cfg.analysis.price_proxy, PriceProxy::Close);
        assert_eq!(cfg.data_source, DataSourceKind::Binance);
        assert_eq!(cfg.timeframes[0].key, Timeframe::D1);
        assert!((cfg.analysis.oversold_threshold - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut cfg = RuntimeConfig::default();
        cfg.analysis.oversold_threshold = 70.0;
        cfg.analysis.overbought_threshold = 30.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvertedThresholds { .. })
        ));
    }

    #[test]
    fn bad_period_and_delay_are_rejected() {
        let mut p = AnalysisParams::default();
        p.oscillator_period = 1;
        assert_eq!(p.validate(), Err(ConfigError::Period(1)));

        let mut p = AnalysisParams::default();
        p.inter_call_delay_secs = -1.0;
        assert_eq!(p.validate(), Err(ConfigError::Delay(-1.0)));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut cfg = RuntimeConfig::default();
        cfg.timeframes.push(TimeframeSpec::from(Timeframe::H1));
        assert_eq!(cfg.validate(), Err(ConfigError::DuplicateLabel("H1".into())));
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner_config.json");
        let mut cfg = RuntimeConfig::default();
        cfg.symbols = vec!["GBP/USD".into()];
        cfg.analysis.overbought_threshold = 75.0;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.symbols, cfg.symbols);
        assert_eq!(loaded.analysis, cfg.analysis);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
