// =============================================================================
// Scan lifecycle: Idle → Running → Completed
// =============================================================================
//
// Idle       no run in flight; a run may start.
// Running    exactly one run in flight; start and rescan requests are refused.
// Completed  the last run finished and its report is published. Only an
//            explicit rescan starts the next run, and it invalidates the
//            source's cache on the way.
//
// A run that is dropped before finishing (task cancelled, panic) falls back
// to Idle and leaves the previous report in place.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ScanError;
use crate::market_data::DataSource;
use crate::scanner::report::AnalysisReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Running { completed: usize, total: usize },
    Completed,
}

/// Serializable view of the lifecycle for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ScanStatus {
    #[serde(flatten)]
    pub phase: ScanPhase,
    pub runs_completed: u64,
    pub last_completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    phase: ScanPhase,
    report: Option<Arc<AnalysisReport>>,
    runs_completed: u64,
}

/// Shared handle on the scan lifecycle. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ScanHandle {
    inner: Arc<RwLock<Inner>>,
}

impl Default for ScanHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                phase: ScanPhase::Idle,
                report: None,
                runs_completed: 0,
            })),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.inner.read().phase
    }

    pub fn status(&self) -> ScanStatus {
        let inner = self.inner.read();
        ScanStatus {
            phase: inner.phase,
            runs_completed: inner.runs_completed,
            last_completed_at: inner.report.as_ref().map(|r| r.completed_at),
        }
    }

    /// Most recent completed report, if any.
    pub fn latest_report(&self) -> Option<Arc<AnalysisReport>> {
        self.inner.read().report.clone()
    }

    /// Idle → Running.
    pub fn begin(&self, total: usize) -> Result<RunGuard, ScanError> {
        let mut inner = self.inner.write();
        match inner.phase {
            ScanPhase::Idle => {}
            ScanPhase::Running { .. } => return Err(ScanError::AlreadyRunning),
            ScanPhase::Completed => return Err(ScanError::RescanRequired),
        }
        inner.phase = ScanPhase::Running {
            completed: 0,
            total,
        };
        Ok(RunGuard {
            handle: self.clone(),
            finished: false,
        })
    }

    /// Completed (or Idle) → Running, dropping the source's cached responses
    /// under the same lock.
    pub fn begin_rescan(&self, source: &dyn DataSource, total: usize) -> Result<RunGuard, ScanError> {
        let mut inner = self.inner.write();
        if matches!(inner.phase, ScanPhase::Running { .. }) {
            return Err(ScanError::AlreadyRunning);
        }
        source.invalidate();
        inner.phase = ScanPhase::Running {
            completed: 0,
            total,
        };
        info!(source = source.name(), "rescan started, cache invalidated");
        Ok(RunGuard {
            handle: self.clone(),
            finished: false,
        })
    }
}

/// Proof that this caller owns the Running phase.
#[derive(Debug)]
pub struct RunGuard {
    handle: ScanHandle,
    finished: bool,
}

impl RunGuard {
    pub fn progress(&self, completed: usize, total: usize) {
        self.handle.inner.write().phase = ScanPhase::Running { completed, total };
    }

    /// Running → Completed, publishing `report`.
    pub fn finish(mut self, report: AnalysisReport) -> Arc<AnalysisReport> {
        let report = Arc::new(report);
        let mut inner = self.handle.inner.write();
        inner.phase = ScanPhase::Completed;
        inner.report = Some(report.clone());
        inner.runs_completed += 1;
        self.finished = true;
        report
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut inner = self.handle.inner.write();
        if matches!(inner.phase, ScanPhase::Running { .. }) {
            warn!("scan abandoned before completion, returning to idle");
            inner.phase = ScanPhase::Idle;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::DataError;
    use crate::market_data::source::Fetched;
    use crate::types::Timeframe;

    #[derive(Default)]
    struct NullSource {
        invalidations: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for NullSource {
        fn name(&self) -> &str {
            "null"
        }
        fn rate_limited(&self) -> bool {
            false
        }
        async fn fetch(&self, _symbol: &str, _timeframe: Timeframe) -> Fetched {
            Fetched::local(Err(DataError::Unavailable("null".into())))
        }
        fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn empty_report() -> AnalysisReport {
        AnalysisReport {
            rows: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn full_lifecycle() {
        let handle = ScanHandle::new();
        assert_eq!(handle.phase(), ScanPhase::Idle);

        let guard = handle.begin(4).unwrap();
        assert_eq!(handle.phase(), ScanPhase::Running { completed: 0, total: 4 });
        guard.progress(2, 4);
        assert_eq!(handle.phase(), ScanPhase::Running { completed: 2, total: 4 });

        guard.finish(empty_report());
        assert_eq!(handle.phase(), ScanPhase::Completed);
        assert!(handle.latest_report().is_some());
        assert_eq!(handle.status().runs_completed, 1);
    }

    #[test]
    fn second_run_is_refused_while_running() {
        let handle = ScanHandle::new();
        let source = NullSource::default();
        let _guard = handle.begin(1).unwrap();
        assert_eq!(handle.begin(1).unwrap_err(), ScanError::AlreadyRunning);
        assert_eq!(
            handle.begin_rescan(&source, 1).unwrap_err(),
            ScanError::AlreadyRunning
        );
        assert_eq!(source.invalidations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn completed_needs_rescan_which_invalidates() {
        let handle = ScanHandle::new();
        let source = NullSource::default();
        handle.begin(1).unwrap().finish(empty_report());

        assert_eq!(handle.begin(1).unwrap_err(), ScanError::RescanRequired);

        let guard = handle.begin_rescan(&source, 1).unwrap();
        assert_eq!(source.invalidations.load(Ordering::SeqCst), 1);
        // Previous report stays visible until the next run replaces it.
        assert!(handle.latest_report().is_some());

        // An abandoned rescan leaves the handle idle and ready to run.
        drop(guard);
        assert_eq!(handle.phase(), ScanPhase::Idle);
        assert!(handle.begin(1).is_ok());
    }

    #[test]
    fn begin_rescan_goes_straight_to_running() {
        let handle = ScanHandle::new();
        let source = NullSource::default();
        handle.begin(1).unwrap().finish(empty_report());

        let _guard = handle.begin_rescan(&source, 3).unwrap();
        assert_eq!(handle.phase(), ScanPhase::Running { completed: 0, total: 3 });
        assert_eq!(source.invalidations.load(Ordering::SeqCst), 1);
        assert!(handle.begin_rescan(&source, 3).is_err());
    }

    #[test]
    fn dropped_run_returns_to_idle() {
        let handle = ScanHandle::new();
        drop(handle.begin(2).unwrap());
        assert_eq!(handle.phase(), ScanPhase::Idle);
        assert!(handle.latest_report().is_none());
    }

    #[test]
    fn status_serializes_phase_inline() {
        let handle = ScanHandle::new();
        let _guard = handle.begin(6).unwrap();
        let json = serde_json::to_value(handle.status()).unwrap();
        assert_eq!(json["phase"], "running");
        assert_eq!(json["total"], 6);
        assert_eq!(json["runs_completed"], 0);
    }
}
