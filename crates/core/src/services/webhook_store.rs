//! Persistence boundaries used by the delivery engine.
//!
//! The dispatcher talks to storage only through these traits so that
//! concurrent deliveries, retention, and tests can share or swap backends.

use std::sync::Arc;

use async_trait::async_trait;
use backoffice_common::{AppResult, PageRequest};
use backoffice_db::entities::{webhook, webhook_execution};
use backoffice_db::repositories::{WebhookExecutionRepository, WebhookRepository};
use chrono::{DateTime, Utc};

/// Read side of webhook subscriptions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Active subscriptions for an event. Order is unspecified.
    async fn find_active_by_event_code(&self, event_code: &str) -> AppResult<Vec<webhook::Model>>;

    /// Any subscription, active or not.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<webhook::Model>>;

    /// Whether an active subscription already targets `url` for `event_code`.
    async fn exists_duplicate(
        &self,
        event_code: &str,
        url: &str,
        exclude_id: Option<&str>,
    ) -> AppResult<bool>;
}

/// Aggregate counts over a window of history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub total: u64,
    pub successful: u64,
}

impl ExecutionStats {
    #[must_use]
    pub const fn failed(&self) -> u64 {
        self.total.saturating_sub(self.successful)
    }

    /// `successful / total`, or 0 when there is no history.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

/// Append-only log of delivery attempts.
#[async_trait]
pub trait ExecutionHistoryStore: Send + Sync {
    /// Persist one attempt. Errors are `AppError::HistoryWrite`.
    async fn append(&self, record: webhook_execution::Model) -> AppResult<String>;

    /// One page of attempts, newest first, plus the total count.
    async fn find_by_webhook_id(
        &self,
        webhook_id: &str,
        page: PageRequest,
    ) -> AppResult<(Vec<webhook_execution::Model>, u64)>;

    /// Counts of attempts with `executed_at >= from`.
    async fn stats(&self, webhook_id: &str, from: DateTime<Utc>) -> AppResult<ExecutionStats>;

    /// Most recent attempt.
    async fn find_last(&self, webhook_id: &str) -> AppResult<Option<webhook_execution::Model>>;

    /// Delete attempts older than `cutoff`, returning how many were removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}

/// Type alias for a shared subscription store.
pub type SubscriptionStoreRef = Arc<dyn SubscriptionStore>;

/// Type alias for a shared history store.
pub type ExecutionHistoryStoreRef = Arc<dyn ExecutionHistoryStore>;

#[async_trait]
impl SubscriptionStore for WebhookRepository {
    async fn find_active_by_event_code(&self, event_code: &str) -> AppResult<Vec<webhook::Model>> {
        Self::find_active_by_event_code(self, event_code).await
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<webhook::Model>> {
        Self::find_by_id(self, id).await
    }

    async fn exists_duplicate(
        &self,
        event_code: &str,
        url: &str,
        exclude_id: Option<&str>,
    ) -> AppResult<bool> {
        Self::exists_duplicate(self, event_code, url, exclude_id).await
    }
}

#[async_trait]
impl ExecutionHistoryStore for WebhookExecutionRepository {
    async fn append(&self, record: webhook_execution::Model) -> AppResult<String> {
        let created = self.create(record.into()).await?;
        Ok(created.id)
    }

    async fn find_by_webhook_id(
        &self,
        webhook_id: &str,
        page: PageRequest,
    ) -> AppResult<(Vec<webhook_execution::Model>, u64)> {
        Self::find_by_webhook_id(self, webhook_id, page).await
    }

    async fn stats(&self, webhook_id: &str, from: DateTime<Utc>) -> AppResult<ExecutionStats> {
        let total = self.count_since(webhook_id, from).await?;
        let successful = self.count_successful_since(webhook_id, from).await?;
        Ok(ExecutionStats { total, successful })
    }

    async fn find_last(&self, webhook_id: &str) -> AppResult<Option<webhook_execution::Model>> {
        Self::find_last(self, webhook_id).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        Self::delete_older_than(self, cutoff).await
    }
}
