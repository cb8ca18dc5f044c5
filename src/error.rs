// =============================================================================
// Error taxonomy
// =============================================================================
//
// Data errors are recovered per cell and never abort a scan. Configuration
// errors are raised before a scan starts and go back to the operator.

use thiserror::Error;

/// Why a data source could not produce a usable series.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    /// Network failure, auth failure, provider notice, or an empty window.
    #[error("data unavailable: {0}")]
    Unavailable(String),

    /// Payload arrived but could not be turned into a valid series.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The source refused the call to stay within its request budget.
    #[error("rate limit reached: {0}")]
    RateLimited(String),

    /// Fewer bars than the indicators need.
    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },
}

impl From<reqwest::Error> for DataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("oscillator_period must be >= 2, got {0}")]
    Period(usize),

    #[error("oversold_threshold ({oversold}) must be below overbought_threshold ({overbought})")]
    InvertedThresholds { oversold: f64, overbought: f64 },

    #[error("{name} must be a finite number in [0, 100], got {value}")]
    ThresholdRange { name: &'static str, value: f64 },

    #[error("divergence_lookback must be >= 3, got {0}")]
    Lookback(usize),

    #[error("peak_min_separation must be >= 1, got {0}")]
    PeakSeparation(usize),

    #[error("inter_call_delay_secs must be finite and >= 0, got {0}")]
    Delay(f64),

    #[error("no symbols configured")]
    NoSymbols,

    #[error("no timeframes configured")]
    NoTimeframes,

    #[error("duplicate timeframe label '{0}'")]
    DuplicateLabel(String),
}

/// Errors from driving the scan state machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyRunning,

    #[error("previous scan completed; request a rescan to run again")]
    RescanRequired,
}
