// =============================================================================
// Central Application State
// =============================================================================
//
// Ties the scanner to the HTTP layer. The scanner owns its own lifecycle lock;
// AppState adds what only the service cares about: the admin token, a
// version counter bumped whenever a report is published, a bounded error log
// and the Binance weight tracker when that source is active.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use crate::binance::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::scanner::{ScanStatus, Scanner};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    pub scanner: Arc<Scanner>,

    /// Expected bearer token for mutating endpoints; `None` locks them.
    pub admin_token: Option<String>,

    /// Bumped on every published report.
    pub report_version: AtomicU64,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Present only for the Binance source.
    pub rate_limit: Option<Arc<RateLimitTracker>>,

    pub start_time: std::time::Instant,
}

/// Payload of `GET /api/v1/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub scan: ScanStatus,
    pub source: String,
    pub report_version: u64,
    pub symbols: usize,
    pub timeframes: Vec<String>,
    pub uptime_secs: u64,
    pub rate_limit: Option<RateLimitSnapshot>,
    pub recent_errors: Vec<ErrorRecord>,
}

impl AppState {
    pub fn new(
        scanner: Arc<Scanner>,
        admin_token: Option<String>,
        rate_limit: Option<Arc<RateLimitTracker>>,
    ) -> Self {
        Self {
            scanner,
            admin_token,
            report_version: AtomicU64::new(0),
            recent_errors: RwLock::new(Vec::new()),
            rate_limit,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn mark_published(&self) -> u64 {
        self.report_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_report_version(&self) -> u64 {
        self.report_version.load(Ordering::SeqCst)
    }

    /// Record an error; the oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String) {
        let mut errors = self.recent_errors.write();
        errors.push(ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    /// Run a full scan (or rescan) to completion and record the outcome.
    pub async fn run_scan(&self, rescan: bool) {
        let result = if rescan {
            self.scanner.rescan().await
        } else {
            self.scanner.run().await
        };
        match result {
            Ok(_) => {
                self.mark_published();
            }
            Err(e) => {
                warn!(error = %e, rescan, "scan not started");
                self.push_error(format!("scan not started: {e}"));
            }
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let config = self.scanner.config();
        StatusSnapshot {
            scan: self.scanner.state().status(),
            source: self.scanner.source_name().to_string(),
            report_version: self.current_report_version(),
            symbols: config.symbols.len(),
            timeframes: config.timeframes.iter().map(|t| t.label.clone()).collect(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            rate_limit: self.rate_limit.as_ref().map(|r| r.snapshot()),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{DataSource, FileSource};
    use crate::runtime_config::RuntimeConfig;

    fn state() -> AppState {
        let source: Arc<dyn DataSource> = Arc::new(FileSource::new("does-not-exist"));
        let config = RuntimeConfig {
            symbols: vec!["EUR/USD".into()],
            ..RuntimeConfig::default()
        };
        let scanner = Arc::new(Scanner::new(config, source).unwrap());
        AppState::new(scanner, None, None)
    }

    #[test]
    fn error_log_is_bounded() {
        let s = state();
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            s.push_error(format!("e{i}"));
        }
        let errors = s.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "e5");
    }

    #[tokio::test]
    async fn run_scan_publishes_and_records_refusals() {
        let s = state();
        s.run_scan(false).await;
        assert_eq!(s.current_report_version(), 1);

        // A plain run after completion is refused and logged.
        s.run_scan(false).await;
        assert_eq!(s.current_report_version(), 1);
        assert_eq!(s.recent_errors.read().len(), 1);

        s.run_scan(true).await;
        assert_eq!(s.current_report_version(), 2);
        assert_eq!(s.status().timeframes, vec!["H1", "H4", "Daily", "Weekly"]);
    }
}
