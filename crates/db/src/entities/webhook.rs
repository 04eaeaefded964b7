//! Webhook configuration entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// HTTP method used for a webhook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[sea_orm(string_value = "GET")]
    Get,
    #[sea_orm(string_value = "PUT")]
    Put,
    #[sea_orm(string_value = "POST")]
    Post,
    #[sea_orm(string_value = "PATCH")]
    Patch,
    #[sea_orm(string_value = "DELETE")]
    Delete,
}

impl HttpMethod {
    /// Canonical upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// A custom header sent with every call of a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookHeader {
    /// Header name.
    pub field: String,
    /// Header value.
    pub value: String,
}

/// Webhook configuration model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhook_configuration")]
pub struct Model {
    /// Unique identifier.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Code of the system event this webhook subscribes to.
    pub event_code: String,

    /// Target URL.
    #[sea_orm(column_type = "Text")]
    pub url: String,

    /// HTTP method used for delivery.
    pub method: HttpMethod,

    /// Ordered custom headers (JSON array of `{ field, value }`).
    #[sea_orm(column_type = "JsonBinary")]
    pub headers: Json,

    /// Is this webhook active?
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Who created this webhook.
    pub created_by: String,

    /// When this webhook was created.
    pub created_at: DateTimeWithTimeZone,

    /// Who last updated this webhook.
    #[sea_orm(nullable)]
    pub updated_by: Option<String>,

    /// When this webhook was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Decode the stored header list, preserving order.
    ///
    /// Rows written outside the application with a malformed header column
    /// decode to an empty list rather than failing the delivery.
    #[must_use]
    pub fn header_list(&self) -> Vec<WebhookHeader> {
        serde_json::from_value(self.headers.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::webhook_execution::Entity")]
    Executions,
}

impl Related<super::webhook_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Executions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
