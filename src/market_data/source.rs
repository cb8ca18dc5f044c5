// =============================================================================
// Data Source capability
// =============================================================================
//
// The only boundary the scanner depends on. Implementations never panic or
// return transport errors to the caller: every failure comes back as a
// `DataError` inside `Fetched`, and the scanner turns it into a default cell.

use async_trait::async_trait;

use crate::error::DataError;
use crate::types::{PriceSeries, Timeframe};

/// Outcome of one fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub series: Result<PriceSeries, DataError>,
    /// Whether the provider was actually contacted. Cache hits report `false`
    /// and do not consume the call budget.
    pub provider_called: bool,
}

impl Fetched {
    pub fn from_provider(series: Result<PriceSeries, DataError>) -> Self {
        Self {
            series,
            provider_called: true,
        }
    }

    pub fn local(series: Result<PriceSeries, DataError>) -> Self {
        Self {
            series,
            provider_called: false,
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short provider name for logs and the status endpoint.
    fn name(&self) -> &str;

    /// `true` when the provider enforces a fixed call-rate budget and the
    /// scanner must wait between calls.
    fn rate_limited(&self) -> bool;

    /// Bars for `symbol` on `timeframe`, ascending by time.
    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Fetched;

    /// Drop any cached responses so the next fetch goes to the provider.
    fn invalidate(&self) {}
}

/// Split `BASE/QUOTE` into its two legs.
pub fn split_pair(symbol: &str) -> Result<(&str, &str), DataError> {
    match symbol.split_once('/') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('/') => {
            Ok((base.trim(), quote.trim()))
        }
        _ => Err(DataError::Malformed(format!(
            "symbol '{symbol}' is not in BASE/QUOTE form"
        ))),
    }
}
