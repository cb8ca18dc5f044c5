// =============================================================================
// Binance klines as a DataSource
// =============================================================================
//
// Binance has native 1h/4h/1d/1w intervals, so nothing is resampled. The last
// kline is usually still forming and is dropped. Binance budgets by request
// weight rather than a fixed call rate, so no inter-call delay is needed; the
// weight tracker refuses calls near the ceiling instead.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::client::{BinanceClient, Kline, KLINES_WEIGHT};
use crate::error::DataError;
use crate::market_data::source::{split_pair, DataSource, Fetched};
use crate::types::{PriceBar, PriceSeries, Timeframe};

pub struct BinanceSource {
    client: BinanceClient,
    limit: u32,
}

impl BinanceSource {
    pub fn new(client: BinanceClient, limit: u32) -> Self {
        Self {
            client,
            limit: limit.clamp(1, 1000),
        }
    }

    pub fn interval(timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// `BTC/USDT` -> `BTCUSDT`
    pub fn exchange_symbol(symbol: &str) -> Result<String, DataError> {
        let (base, quote) = split_pair(symbol)?;
        Ok(format!("{base}{quote}").to_uppercase())
    }

    /// Checks that need no request: symbol shape and remaining weight.
    fn preflight(&self, symbol: &str) -> Result<String, DataError> {
        let pair = Self::exchange_symbol(symbol)?;
        if !self.client.rate_limit().can_send_request(KLINES_WEIGHT) {
            return Err(DataError::RateLimited(format!(
                "weight {} used this minute",
                self.client.rate_limit().current_weight()
            )));
        }
        Ok(pair)
    }

    async fn request(
        &self,
        symbol: &str,
        pair: &str,
        timeframe: Timeframe,
    ) -> Result<PriceSeries, DataError> {
        let klines = self
            .client
            .get_klines(pair, Self::interval(timeframe), self.limit)
            .await
            .map_err(|e| DataError::Unavailable(format!("{e:#}")))?;

        let bars = closed_bars(&klines, Utc::now().timestamp_millis());
        if bars.is_empty() {
            return Err(DataError::Unavailable("no closed klines".into()));
        }
        PriceSeries::from_unordered(symbol, timeframe, bars)
    }
}

/// Bars for every kline whose close time has passed.
fn closed_bars(klines: &[Kline], now_ms: i64) -> Vec<PriceBar> {
    klines
        .iter()
        .filter(|k| k.close_time < now_ms)
        .map(|k| PriceBar::new(k.open_time, k.open, k.high, k.low, k.close))
        .collect()
}

#[async_trait]
impl DataSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    fn rate_limited(&self) -> bool {
        false
    }

    #[instrument(skip(self), name = "binance::fetch")]
    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Fetched {
        let pair = match self.preflight(symbol) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "fetch refused before request");
                return Fetched::local(Err(e));
            }
        };
        let series = self.request(symbol, &pair, timeframe).await;
        match &series {
            Ok(s) => debug!(bars = s.len(), "series fetched"),
            Err(e) => warn!(error = %e, "fetch failed"),
        }
        Fetched::from_provider(series)
    }
}

impl std::fmt::Debug for BinanceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceSource")
            .field("client", &self.client)
            .field("limit", &self.limit)
            .finish()
    }
}
