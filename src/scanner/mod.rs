// =============================================================================
// Scanner: configured universe, one data source, one lifecycle
// =============================================================================

pub mod orchestrator;
pub mod report;
pub mod state;

use std::sync::Arc;

use tracing::info;

use crate::error::{ConfigError, ScanError};
use crate::market_data::DataSource;
use crate::runtime_config::RuntimeConfig;

use orchestrator::run_analysis;
pub use report::AnalysisReport;
pub use state::{RunGuard, ScanHandle, ScanPhase, ScanStatus};

pub struct Scanner {
    config: RuntimeConfig,
    source: Arc<dyn DataSource>,
    state: ScanHandle,
}

impl Scanner {
    /// Rejects an invalid configuration before any fetch happens.
    pub fn new(config: RuntimeConfig, source: Arc<dyn DataSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            state: ScanHandle::new(),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn state(&self) -> &ScanHandle {
        &self.state
    }

    fn total_cells(&self) -> usize {
        self.config.symbols.len() * self.config.timeframes.len()
    }

    /// Claim the Running phase for a first (or post-rescan) run.
    pub fn start(&self) -> Result<RunGuard, ScanError> {
        self.state.begin(self.total_cells())
    }

    /// Invalidate cached data and claim the Running phase in one step.
    pub fn start_rescan(&self) -> Result<RunGuard, ScanError> {
        self.state.begin_rescan(self.source.as_ref(), self.total_cells())
    }

    /// Run the scan owned by `guard` and publish its report.
    pub async fn execute(&self, guard: RunGuard) -> Arc<AnalysisReport> {
        let report = run_analysis(
            &self.config.symbols,
            &self.config.timeframes,
            self.source.as_ref(),
            &self.config.analysis,
            |done, total| guard.progress(done, total),
        )
        .await;
        let report = guard.finish(report);
        info!(rows = report.rows.len(), "report published");
        report
    }

    pub async fn run(&self) -> Result<Arc<AnalysisReport>, ScanError> {
        let guard = self.start()?;
        Ok(self.execute(guard).await)
    }

    pub async fn rescan(&self) -> Result<Arc<AnalysisReport>, ScanError> {
        let guard = self.start_rescan()?;
        Ok(self.execute(guard).await)
    }
}
