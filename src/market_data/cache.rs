// =============================================================================
// Response cache: TTL cache in front of any DataSource
// =============================================================================
//
// Successful series are kept per (symbol, timeframe) for `ttl`. A hit is
// served locally and reported as not touching the provider, so the scanner
// skips the inter-call delay for it. Failures are never cached. A rescan
// calls `invalidate()` to force fresh data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source::{DataSource, Fetched};
use crate::types::{PriceSeries, Timeframe};

/// Composite key that identifies a cached series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

struct CacheEntry {
    series: PriceSeries,
    stored_at: Instant,
}

pub struct CachedSource {
    inner: Arc<dyn DataSource>,
    entries: RwLock<HashMap<SeriesKey, CacheEntry>>,
    ttl: Duration,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn DataSource>, ttl: Duration) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .count()
    }

    fn lookup(&self, key: &SeriesKey) -> Option<PriceSeries> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.series.clone())
    }
}

#[async_trait]
impl DataSource for CachedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn rate_limited(&self) -> bool {
        self.inner.rate_limited()
    }

    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Fetched {
        let key = SeriesKey {
            symbol: symbol.to_string(),
            timeframe,
        };

        if let Some(series) = self.lookup(&key) {
            debug!(key = %key, "cache hit");
            return Fetched::local(Ok(series));
        }

        let fetched = self.inner.fetch(symbol, timeframe).await;
        if let Ok(series) = &fetched.series {
            self.entries.write().insert(
                key,
                CacheEntry {
                    series: series.clone(),
                    stored_at: Instant::now(),
                },
            );
        }
        fetched
    }

    fn invalidate(&self) {
        let dropped = {
            let mut entries = self.entries.write();
            let n = entries.len();
            entries.clear();
            n
        };
        debug!(dropped, "response cache invalidated");
        self.inner.invalidate();
    }
}

impl std::fmt::Debug for CachedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSource")
            .field("inner", &self.inner.name())
            .field("live_entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
