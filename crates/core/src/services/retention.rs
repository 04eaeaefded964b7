//! Periodic pruning of webhook execution history.

use std::time::Duration;

use backoffice_common::{AppError, AppResult, config::RetentionConfig};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::cancel::CancelSignal;
use super::webhook_store::ExecutionHistoryStoreRef;

/// Deletes history rows older than a fixed number of days.
#[derive(Clone)]
pub struct HistoryRetentionJob {
    history: ExecutionHistoryStoreRef,
    keep_days: u32,
    every: Duration,
}

impl HistoryRetentionJob {
    #[must_use]
    pub const fn new(history: ExecutionHistoryStoreRef, keep_days: u32, every: Duration) -> Self {
        Self {
            history,
            keep_days,
            every,
        }
    }

    #[must_use]
    pub const fn from_config(history: ExecutionHistoryStoreRef, config: &RetentionConfig) -> Self {
        Self::new(
            history,
            config.keep_days,
            Duration::from_secs(config.interval_secs),
        )
    }

    /// Run one pruning pass. Returns the number of rows removed.
    ///
    /// A `keep_days` reaching past the representable date range is a
    /// configuration error; nothing is deleted.
    pub async fn run_once(&self) -> AppResult<u64> {
        let cutoff = chrono::Utc::now()
            .checked_sub_signed(chrono::Duration::days(i64::from(self.keep_days)))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "retention.keep_days is out of range: {}",
                    self.keep_days
                ))
            })?;
        self.history.delete_older_than(cutoff).await
    }

    /// Run on an interval until `cancel` fires. The first pass runs immediately.
    pub fn spawn(self, cancel: CancelSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.every.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = cancel.cancelled() => break,
                }

                match self.run_once().await {
                    Ok(count) => {
                        if count > 0 {
                            tracing::info!(
                                count,
                                keep_days = self.keep_days,
                                "Pruned webhook execution history"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to prune webhook execution history");
                    }
                }
            }

            tracing::debug!("History retention job stopped");
        })
    }
}
