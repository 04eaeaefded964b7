//! Webhook execution history entity.
//!
//! One row per delivery attempt. Rows are only ever inserted by the
//! dispatcher and bulk-deleted by the retention job.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Webhook execution history model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhook_execution_history")]
pub struct Model {
    /// Unique identifier (ULID, sortable by creation time).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Webhook this attempt belongs to.
    pub webhook_id: String,

    /// When the attempt resolved.
    pub executed_at: DateTimeWithTimeZone,

    /// Whether the endpoint answered with a 2xx status.
    pub success: bool,

    /// HTTP status received, `None` if the call never completed.
    #[sea_orm(nullable)]
    pub status_code: Option<i32>,

    /// 1-based attempt number within one delivery.
    pub attempt: i32,

    /// Request body as sent.
    #[sea_orm(column_type = "Text")]
    pub request_payload: String,

    /// Response body, truncated to the configured size.
    #[sea_orm(column_type = "Text", nullable)]
    pub response_body: Option<String>,

    /// Transport or HTTP error description.
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    /// Attempt duration in milliseconds.
    pub duration_ms: i64,

    /// `system` for event-triggered attempts, `test:<actor>` for manual tests.
    pub triggered_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::webhook::Entity",
        from = "Column::WebhookId",
        to = "super::webhook::Column::Id",
        on_delete = "Cascade"
    )]
    Webhook,
}

impl Related<super::webhook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Webhook.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
