//! Webhook configuration repository.

use std::sync::Arc;

use crate::entities::{Webhook, webhook};
use backoffice_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};

/// Map a write failure. Hitting the active-target unique index is a conflict.
fn map_write_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(format!(
            "An active webhook already targets this URL for the event: {detail}"
        )),
        _ => AppError::Database(err.to_string()),
    }
}

/// Webhook repository for database operations.
#[derive(Clone)]
pub struct WebhookRepository {
    db: Arc<DatabaseConnection>,
}

impl WebhookRepository {
    /// Create a new webhook repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a webhook by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<webhook::Model>> {
        Webhook::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a webhook by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<webhook::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::WebhookNotFound(id.to_string()))
    }

    /// List all webhooks, newest first.
    pub async fn find_all(&self) -> AppResult<Vec<webhook::Model>> {
        Webhook::find()
            .order_by_desc(webhook::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all active webhooks subscribed to an event.
    pub async fn find_active_by_event_code(
        &self,
        event_code: &str,
    ) -> AppResult<Vec<webhook::Model>> {
        Webhook::find()
            .filter(webhook::Column::EventCode.eq(event_code))
            .filter(webhook::Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether an active webhook already targets `url` for `event_code`.
    ///
    /// `exclude_id` leaves the record being updated out of the comparison.
    pub async fn exists_duplicate(
        &self,
        event_code: &str,
        url: &str,
        exclude_id: Option<&str>,
    ) -> AppResult<bool> {
        let mut query = Webhook::find()
            .filter(webhook::Column::EventCode.eq(event_code))
            .filter(webhook::Column::Url.eq(url))
            .filter(webhook::Column::IsActive.eq(true));

        if let Some(id) = exclude_id {
            query = query.filter(webhook::Column::Id.ne(id));
        }

        let count = query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Create a new webhook.
    pub async fn create(&self, model: webhook::ActiveModel) -> AppResult<webhook::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(map_write_err)
    }

    /// Update a webhook.
    pub async fn update(&self, model: webhook::ActiveModel) -> AppResult<webhook::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(map_write_err)
    }

    /// Toggle the active flag of a webhook.
    pub async fn set_active(
        &self,
        id: &str,
        is_active: bool,
        updated_by: &str,
    ) -> AppResult<webhook::Model> {
        let webhook = self.get_by_id(id).await?;
        let mut active: webhook::ActiveModel = webhook.into();

        active.is_active = Set(is_active);
        active.updated_by = Set(Some(updated_by.to_string()));
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.update(active).await
    }

    /// Delete a webhook. Its execution history goes with it (FK cascade).
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Webhook::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::WebhookNotFound(id.to_string()));
        }
        Ok(())
    }
}
