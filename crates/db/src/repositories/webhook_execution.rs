//! Webhook execution history repository.

use std::sync::Arc;

use crate::entities::{WebhookExecution, webhook_execution};
use backoffice_common::{AppError, AppResult, PageRequest};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, prelude::DateTimeWithTimeZone,
};

/// Execution history repository for database operations.
#[derive(Clone)]
pub struct WebhookExecutionRepository {
    db: Arc<DatabaseConnection>,
}

impl WebhookExecutionRepository {
    /// Create a new execution history repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert one attempt record.
    pub async fn create(
        &self,
        model: webhook_execution::ActiveModel,
    ) -> AppResult<webhook_execution::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::HistoryWrite(e.to_string()))
    }

    /// One page of attempts for a webhook, newest first, plus the total count.
    ///
    /// Ordering is `executed_at DESC, id DESC` so repeated reads of the same
    /// page are stable while no new rows arrive.
    pub async fn find_by_webhook_id(
        &self,
        webhook_id: &str,
        page: PageRequest,
    ) -> AppResult<(Vec<webhook_execution::Model>, u64)> {
        let total = WebhookExecution::find()
            .filter(webhook_execution::Column::WebhookId.eq(webhook_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let items = WebhookExecution::find()
            .filter(webhook_execution::Column::WebhookId.eq(webhook_id))
            .order_by_desc(webhook_execution::Column::ExecutedAt)
            .order_by_desc(webhook_execution::Column::Id)
            .offset(page.offset())
            .limit(page.page_size())
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((items, total))
    }

    /// Count attempts for a webhook since `from` (inclusive).
    pub async fn count_since(&self, webhook_id: &str, from: DateTime<Utc>) -> AppResult<u64> {
        let from: DateTimeWithTimeZone = from.into();
        WebhookExecution::find()
            .filter(webhook_execution::Column::WebhookId.eq(webhook_id))
            .filter(webhook_execution::Column::ExecutedAt.gte(from))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count successful attempts for a webhook since `from` (inclusive).
    pub async fn count_successful_since(
        &self,
        webhook_id: &str,
        from: DateTime<Utc>,
    ) -> AppResult<u64> {
        let from: DateTimeWithTimeZone = from.into();
        WebhookExecution::find()
            .filter(webhook_execution::Column::WebhookId.eq(webhook_id))
            .filter(webhook_execution::Column::ExecutedAt.gte(from))
            .filter(webhook_execution::Column::Success.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most recent attempt for a webhook.
    pub async fn find_last(&self, webhook_id: &str) -> AppResult<Option<webhook_execution::Model>> {
        WebhookExecution::find()
            .filter(webhook_execution::Column::WebhookId.eq(webhook_id))
            .order_by_desc(webhook_execution::Column::ExecutedAt)
            .order_by_desc(webhook_execution::Column::Id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every attempt older than `cutoff`. Returns the number of rows removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let cutoff: DateTimeWithTimeZone = cutoff.into();
        let result = WebhookExecution::delete_many()
            .filter(webhook_execution::Column::ExecutedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_execution(id: &str, webhook_id: &str, success: bool) -> webhook_execution::Model {
        webhook_execution::Model {
            id: id.to_string(),
            webhook_id: webhook_id.to_string(),
            executed_at: Utc::now().into(),
            success,
            status_code: Some(if success { 200 } else { 503 }),
            attempt: 1,
            request_payload: "{\"loanId\":42}".to_string(),
            response_body: None,
            error: None,
            duration_ms: 12,
            triggered_by: "system".to_string(),
        }
    }

    fn count_row(count: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! {
            "num_items" => sea_orm::Value::BigInt(Some(count))
        }
    }

    #[tokio::test]
    async fn test_create() {
        let record = create_test_execution("ex1", "wh1", true);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[record.clone()]])
                .into_connection(),
        );

        let repo = WebhookExecutionRepository::new(db);
        let active = webhook_execution::ActiveModel {
            id: Set(record.id.clone()),
            webhook_id: Set(record.webhook_id.clone()),
            executed_at: Set(record.executed_at),
            success: Set(true),
            status_code: Set(Some(200)),
            attempt: Set(1),
            request_payload: Set(record.request_payload.clone()),
            response_body: Set(None),
            error: Set(None),
            duration_ms: Set(12),
            triggered_by: Set("system".to_string()),
        };
        let created = repo.create(active).await.unwrap();

        assert_eq!(created.id, "ex1");
    }

    #[tokio::test]
    async fn test_find_by_webhook_id_returns_items_and_total() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count_row(25)]])
                .append_query_results([[
                    create_test_execution("ex3", "wh1", true),
                    create_test_execution("ex2", "wh1", false),
                ]])
                .into_connection(),
        );

        let repo = WebhookExecutionRepository::new(db);
        let (items, total) = repo
            .find_by_webhook_id("wh1", PageRequest::new(Some(3), Some(10)))
            .await
            .unwrap();

        assert_eq!(total, 25);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "ex3");
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count_row(10)]])
                .append_query_results([[count_row(7)]])
                .into_connection(),
        );

        let repo = WebhookExecutionRepository::new(db);
        let from = Utc::now() - chrono::Duration::days(30);

        assert_eq!(repo.count_since("wh1", from).await.unwrap(), 10);
        assert_eq!(repo.count_successful_since("wh1", from).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_find_last_empty() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<webhook_execution::Model>::new()])
                .into_connection(),
        );

        let repo = WebhookExecutionRepository::new(db);
        assert!(repo.find_last("wh1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 42,
                }])
                .into_connection(),
        );

        let repo = WebhookExecutionRepository::new(db);
        let deleted = repo
            .delete_older_than(Utc::now() - chrono::Duration::days(90))
            .await
            .unwrap();

        assert_eq!(deleted, 42);
    }

    #[tokio::test]
    async fn test_create_failure_maps_to_history_write() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([sea_orm::DbErr::Custom("disk full".to_string())])
                .into_connection(),
        );

        let repo = WebhookExecutionRepository::new(db);
        let record = create_test_execution("ex1", "wh1", true);
        let active: webhook_execution::ActiveModel = record.into();
        let result = repo.create(active).await;

        assert!(matches!(result, Err(AppError::HistoryWrite(_))));
    }
}
