// =============================================================================
// Alpha Vantage FX data source
// =============================================================================
//
// Endpoints used (all under https://www.alphavantage.co/query):
//   H1 -> FX_INTRADAY interval=60min outputsize=compact
//   H4 -> FX_INTRADAY interval=60min outputsize=full, resampled to 4h
//   D1 -> FX_DAILY    outputsize=full
//   W1 -> FX_WEEKLY
//
// The free tier allows 5 calls per minute, so this source is rate-limited and
// the scanner spaces calls out. Quota notices arrive as HTTP 200 with a
// `Note` / `Information` body and are treated as unavailable data.
// =============================================================================

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, instrument, warn};

use super::resample::resample_h1_to_h4;
use super::source::{split_pair, DataSource, Fetched};
use crate::error::DataError;
use crate::types::{PriceBar, PriceSeries, Timeframe};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Body keys Alpha Vantage uses for errors and quota notices.
const NOTICE_KEYS: &[&str] = &["Error Message", "Note", "Information"];

pub struct AlphaVantageSource {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AlphaVantageSource {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build reqwest client")?;

        debug!("AlphaVantageSource initialised (base_url={BASE_URL})");

        Ok(Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            client,
        })
    }

    /// Query parameters for one fetch (without the API key).
    fn query(from: &str, to: &str, timeframe: Timeframe) -> Vec<(&'static str, String)> {
        let mut q = Vec::with_capacity(5);
        match timeframe {
            Timeframe::H1 | Timeframe::H4 => {
                q.push(("function", "FX_INTRADAY".to_string()));
                q.push(("interval", "60min".to_string()));
                let size = if timeframe == Timeframe::H4 { "full" } else { "compact" };
                q.push(("outputsize", size.to_string()));
            }
            Timeframe::D1 => {
                q.push(("function", "FX_DAILY".to_string()));
                q.push(("outputsize", "full".to_string()));
            }
            Timeframe::W1 => q.push(("function", "FX_WEEKLY".to_string())),
        }
        q.push(("from_symbol", from.to_string()));
        q.push(("to_symbol", to.to_string()));
        q
    }

    async fn request(
        &self,
        symbol: &str,
        (from, to): (&str, &str),
        timeframe: Timeframe,
    ) -> Result<PriceSeries, DataError> {
        let mut query = Self::query(from, to, timeframe);
        query.push(("apikey", self.api_key.clone()));

        let resp = self.client.get(&self.base_url).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Unavailable(format!("HTTP {status}")));
        }
        let body: serde_json::Value = resp.json().await?;

        // Intraday is always fetched hourly; H4 is built from it.
        let native = if timeframe == Timeframe::H4 {
            Timeframe::H1
        } else {
            timeframe
        };
        let bars = parse_time_series(&body, native)?;
        let series = PriceSeries::from_unordered(symbol, native, bars)?;

        if timeframe == Timeframe::H4 {
            resample_h1_to_h4(&series)
        } else {
            Ok(series)
        }
    }
}

#[async_trait]
impl DataSource for AlphaVantageSource {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn rate_limited(&self) -> bool {
        true
    }

    #[instrument(skip(self), name = "alpha_vantage::fetch")]
    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Fetched {
        // A bad symbol is rejected before any request, so it costs no quota.
        let pair = match split_pair(symbol) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "symbol rejected");
                return Fetched::local(Err(e));
            }
        };
        let series = self.request(symbol, pair, timeframe).await;
        match &series {
            Ok(s) => debug!(bars = s.len(), "series fetched"),
            Err(e) => warn!(error = %e, "fetch failed"),
        }
        Fetched::from_provider(series)
    }
}

impl std::fmt::Debug for AlphaVantageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageSource")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// =============================================================================
// Payload parsing
// =============================================================================

fn series_key(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::H1 | Timeframe::H4 => "Time Series FX (60min)",
        Timeframe::D1 => "Time Series FX (Daily)",
        Timeframe::W1 => "Time Series FX (Weekly)",
    }
}

/// Extract bars from an Alpha Vantage FX payload. Order is whatever the JSON
/// object yields; callers sort.
pub fn parse_time_series(
    body: &serde_json::Value,
    timeframe: Timeframe,
) -> Result<Vec<PriceBar>, DataError> {
    for key in NOTICE_KEYS {
        if let Some(msg) = body.get(*key).and_then(|v| v.as_str()) {
            return Err(DataError::Unavailable(format!("{key}: {msg}")));
        }
    }

    let entries = body
        .get(series_key(timeframe))
        .and_then(|v| v.as_object())
        .ok_or_else(|| DataError::Malformed(format!("missing '{}'", series_key(timeframe))))?;

    if entries.is_empty() {
        return Err(DataError::Unavailable("empty time series".into()));
    }

    entries
        .iter()
        .map(|(stamp, fields)| {
            Ok(PriceBar::new(
                parse_timestamp(stamp)?,
                parse_field(fields, "1. open")?,
                parse_field(fields, "2. high")?,
                parse_field(fields, "3. low")?,
                parse_field(fields, "4. close")?,
            ))
        })
        .collect()
}

/// `2024-01-05 16:00:00` (intraday) or `2024-01-05` (daily/weekly), UTC.
fn parse_timestamp(stamp: &str) -> Result<i64, DataError> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(stamp, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| DataError::Malformed(format!("bad timestamp '{stamp}'")))
}

/// Alpha Vantage sends prices as JSON strings.
fn parse_field(fields: &serde_json::Value, name: &str) -> Result<f64, DataError> {
    match fields.get(name) {
        Some(serde_json::Value::String(s)) => s
            .parse::<f64>()
            .map_err(|_| DataError::Malformed(format!("field {name} is not a number: {s}"))),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| DataError::Malformed(format!("field {name} is not a valid f64"))),
        _ => Err(DataError::Malformed(format!("missing field {name}"))),
    }
}
