// =============================================================================
// Shared types used across the scanner
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Native bar interval a data source is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    /// Default display label used as the report column name.
    pub fn default_label(self) -> &'static str {
        match self {
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::D1 => "Daily",
            Self::W1 => "Weekly",
        }
    }

    /// Parse a fetch key such as `"H4"` or `"d1"`.
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_uppercase().as_str() {
            "H1" => Some(Self::H1),
            "H4" => Some(Self::H4),
            "D1" => Some(Self::D1),
            "W1" => Some(Self::W1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H1 => write!(f, "H1"),
            Self::H4 => write!(f, "H4"),
            Self::D1 => write!(f, "D1"),
            Self::W1 => write!(f, "W1"),
        }
    }
}

/// A timeframe to scan together with the column label it is reported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeSpec {
    pub key: Timeframe,
    pub label: String,
}

impl From<Timeframe> for TimeframeSpec {
    fn from(key: Timeframe) -> Self {
        Self {
            key,
            label: key.default_label().to_string(),
        }
    }
}

/// Which per-bar value the oscillator is computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceProxy {
    /// `(open + high + low + close) / 4`
    Ohlc4,
    /// Close price only.
    Close,
}

impl Default for PriceProxy {
    fn default() -> Self {
        Self::Ohlc4
    }
}

/// One OHLC bar. `timestamp` is the bar open time in milliseconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    pub fn proxy(&self, mode: PriceProxy) -> f64 {
        match mode {
            PriceProxy::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
            PriceProxy::Close => self.close,
        }
    }

    fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Ascending, duplicate-free bars for one (symbol, timeframe) pair.
///
/// Only constructible through [`PriceSeries::new`], so every instance holds
/// finite non-negative prices and strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<PriceBar>,
    ) -> Result<Self, DataError> {
        if let Some(bad) = bars.iter().position(|b| !b.is_valid()) {
            return Err(DataError::Malformed(format!(
                "bar {bad} has a non-finite or negative price"
            )));
        }
        if let Some(i) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(DataError::Malformed(format!(
                "timestamps not strictly increasing at bar {}",
                i + 1
            )));
        }

        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        })
    }

    /// Sort by timestamp and drop repeated timestamps (first wins) before
    /// validating. Providers return bars newest-first or with overlaps.
    pub fn from_unordered(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        mut bars: Vec<PriceBar>,
    ) -> Result<Self, DataError> {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self::new(symbol, timeframe, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Oscillator values aligned 1:1 with a [`PriceSeries`]; `None` in the
/// warm-up prefix.
pub type OscillatorSeries = Vec<Option<f64>>;

/// Result of the divergence detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Divergence {
    None,
    Bullish,
    Bearish,
}

impl Default for Divergence {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Threshold band an oscillator value falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalClass {
    Oversold,
    Overbought,
    Neutral,
}

impl Default for SignalClass {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for SignalClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oversold => write!(f, "oversold"),
            Self::Overbought => write!(f, "overbought"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}
