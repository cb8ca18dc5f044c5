// =============================================================================
// Binance REST API Client: public market data
// =============================================================================
//
// Only the unsigned klines endpoint is used. Every response feeds the shared
// `RateLimitTracker` so the source can refuse calls before Binance starts
// answering with 429s.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use super::rate_limit::RateLimitTracker;

/// Request weight of GET /api/v3/klines for limits up to 1000.
pub const KLINES_WEIGHT: u32 = 2;

/// One kline as returned by Binance.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    pub fn new(rate_limit: Arc<RateLimitTracker>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!("BinanceClient initialised (base_url=https://api.binance.com)");

        Ok(Self {
            base_url: "https://api.binance.com".to_string(),
            client,
            rate_limit,
        })
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    /// GET /api/v3/klines (public, unsigned).
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, ...
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let klines = parse_klines(&body)?;
        debug!(symbol, interval, count = klines.len(), "klines fetched");
        Ok(klines)
    }
}

/// Parse Binance's array-of-arrays klines payload.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Kline>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut klines = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        klines.push(Kline {
            open_time: arr[0].as_i64().context("kline openTime is not an integer")?,
            open: parse_str_f64(&arr[1])?,
            high: parse_str_f64(&arr[2])?,
            low: parse_str_f64(&arr[3])?,
            close: parse_str_f64(&arr[4])?,
            close_time: arr[6].as_i64().context("kline closeTime is not an integer")?,
        });
    }

    Ok(klines)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_prices() {
        let body = json!([
            [1700000000000i64, "37000.00", "37050.00", "36990.00", "37020.00", "12.3", 1700003599999i64, "0", 10, "0", "0", "0"]
        ]);
        let k = parse_klines(&body).unwrap();
        assert_eq!(k.len(), 1);
        assert_eq!(k[0].open_time, 1_700_000_000_000);
        assert!((k[0].close - 37020.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_entries_are_skipped() {
        let body = json!([[1, "1", "1"]]);
        assert!(parse_klines(&body).unwrap().is_empty());
    }

    #[test]
    fn non_array_is_an_error() {
        assert!(parse_klines(&json!({ "code": -1121, "msg": "Invalid symbol." })).is_err());
    }
}
