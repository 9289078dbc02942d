//! Retention cleanup of indicator history and acknowledged signals.

use crate::config::RetentionConfig;
use crate::services::database::StoreError;
use crate::services::indicator_store::IndicatorStore;
use crate::services::signal_log::SignalLog;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Outcome of one purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub cutoff: DateTime<Utc>,
    pub indicators_deleted: usize,
    pub signals_deleted: usize,
}

/// Deletes data older than a cutoff, manually or on a timer.
pub struct RetentionService {
    indicators: Arc<IndicatorStore>,
    signal_log: Arc<SignalLog>,
    config: RetentionConfig,
    last_report: RwLock<Option<PurgeReport>>,
}

impl RetentionService {
    pub fn new(
        indicators: Arc<IndicatorStore>,
        signal_log: Arc<SignalLog>,
        config: RetentionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            indicators,
            signal_log,
            config,
            last_report: RwLock::new(None),
        })
    }

    /// Delete history older than `older_than` and acknowledged signals older
    /// than the same cutoff. Unacknowledged signals are kept.
    ///
    /// Safe to interrupt and re-run: each batch commits independently.
    pub fn purge(&self, older_than: Duration) -> Result<PurgeReport, StoreError> {
        if older_than < Duration::zero() {
            return Err(StoreError::RetentionWindow(older_than.num_days()));
        }
        let cutoff = Utc::now()
            .checked_sub_signed(older_than)
            .ok_or(StoreError::RetentionWindow(older_than.num_days()))?;
        let indicators_deleted = self.indicators.purge_history(cutoff)?;
        let signals_deleted = self.signal_log.purge_acknowledged(cutoff)?;

        Ok(PurgeReport {
            cutoff,
            indicators_deleted,
            signals_deleted,
        })
    }

    /// Purge and remember the report.
    pub async fn run_cleanup(&self, older_than: Duration) -> Result<PurgeReport, StoreError> {
        let report = self.purge(older_than)?;
        info!(
            "Cleanup removed {} indicator rows and {} signals older than {}",
            report.indicators_deleted, report.signals_deleted, report.cutoff
        );
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    /// Report of the most recent cleanup.
    pub async fn last_report(&self) -> Option<PurgeReport> {
        self.last_report.read().await.clone()
    }

    /// Start the automatic cleanup task when enabled.
    pub fn start(self: Arc<Self>) {
        if !self.config.auto_cleanup_enabled {
            info!("Automatic cleanup disabled");
            return;
        }

        info!(
            "Starting automatic cleanup (retention: {} days, every {}s)",
            self.config.retention_days, self.config.cleanup_interval_secs
        );

        tokio::spawn(async move {
            self.auto_cleanup_loop().await;
        });
    }

    async fn auto_cleanup_loop(&self) {
        let period = std::time::Duration::from_secs(self.config.cleanup_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        let older_than = Duration::days(i64::from(self.config.retention_days));

        loop {
            interval.tick().await;
            debug!("Running scheduled cleanup");

            if let Err(e) = self.run_cleanup(older_than).await {
                error!("Automatic cleanup failed: {}", e);
            }
        }
    }
}
