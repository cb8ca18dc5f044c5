// =============================================================================
// Local JSON files as a DataSource
// =============================================================================
//
// Layout: `<dir>/<BASE>_<QUOTE>_<KEY>.json`, e.g. `data/EUR_USD_D1.json`,
// each holding an array of `{timestamp, open, high, low, close}` objects.
// When no H4 file exists the H1 file is resampled. Reads are local, so this
// source is never rate-limited.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::resample::resample_h1_to_h4;
use super::source::{split_pair, DataSource, Fetched};
use crate::error::DataError;
use crate::types::{PriceBar, PriceSeries, Timeframe};

#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> Result<PathBuf, DataError> {
        let (base, quote) = split_pair(symbol)?;
        Ok(self.dir.join(format!("{base}_{quote}_{timeframe}.json")))
    }

    async fn read(&self, path: &Path, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, DataError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DataError::Unavailable(format!("{}: {e}", path.display())))?;
        let bars: Vec<PriceBar> = serde_json::from_str(&content)
            .map_err(|e| DataError::Malformed(format!("{}: {e}", path.display())))?;
        if bars.is_empty() {
            return Err(DataError::Unavailable(format!("{} has no bars", path.display())));
        }
        PriceSeries::from_unordered(symbol, timeframe, bars)
    }

    async fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, DataError> {
        let path = self.path_for(symbol, timeframe)?;
        if timeframe == Timeframe::H4 && !path.exists() {
            let hourly_path = self.path_for(symbol, Timeframe::H1)?;
            debug!(path = %hourly_path.display(), "no H4 file, resampling H1");
            let hourly = self.read(&hourly_path, symbol, Timeframe::H1).await?;
            return resample_h1_to_h4(&hourly);
        }
        self.read(&path, symbol, timeframe).await
    }
}

#[async_trait]
impl DataSource for FileSource {
    fn name(&self) -> &str {
        "files"
    }

    fn rate_limited(&self) -> bool {
        false
    }

    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Fetched {
        let series = self.load(symbol, timeframe).await;
        if let Err(e) = &series {
            warn!(symbol, timeframe = %timeframe, error = %e, "file fetch failed");
        }
        Fetched::from_provider(series)
    }
}
