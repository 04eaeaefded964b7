//! Webhook administration service.

use std::sync::Arc;

use backoffice_common::{AppError, AppResult, IdGenerator, Page, PageRequest};
use backoffice_db::entities::webhook::{self, HttpMethod, WebhookHeader};
use backoffice_db::entities::webhook_execution;
use backoffice_db::repositories::WebhookRepository;
use reqwest::header::{HeaderName, HeaderValue};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

use super::cancel::CancelSignal;
use super::event_catalog::EventCatalog;
use super::webhook_dispatcher::{DeliveryOutcome, Trigger, WebhookDispatcher};
use super::webhook_store::{ExecutionHistoryStoreRef, SubscriptionStoreRef};

/// Window used by [`WebhookService::stats`] when none is given.
pub const DEFAULT_STATS_DAYS: u32 = 30;

/// Widest statistics window, in days.
pub const MAX_STATS_DAYS: u32 = 3650;

const fn default_method() -> HttpMethod {
    HttpMethod::Post
}

const fn default_true() -> bool {
    true
}

/// Input for creating a webhook.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookInput {
    #[validate(length(min = 1, max = 64))]
    pub event_code: String,
    #[validate(url, length(max = 2048))]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: Vec<WebhookHeader>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Input for updating a webhook. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebhookInput {
    #[validate(length(min = 1, max = 64))]
    pub event_code: Option<String>,
    #[validate(url, length(max = 2048))]
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub headers: Option<Vec<WebhookHeader>>,
    pub is_active: Option<bool>,
}

/// Response for a webhook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub id: String,
    pub event_code: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<WebhookHeader>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_by: Option<String>,
    pub updated_at: Option<String>,
}

impl From<webhook::Model> for WebhookResponse {
    fn from(w: webhook::Model) -> Self {
        let headers = w.header_list();
        Self {
            id: w.id,
            event_code: w.event_code,
            url: w.url,
            method: w.method,
            headers,
            is_active: w.is_active,
            created_by: w.created_by,
            created_at: w.created_at.to_rfc3339(),
            updated_by: w.updated_by,
            updated_at: w.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// One recorded delivery attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub id: String,
    pub webhook_id: String,
    pub executed_at: String,
    pub success: bool,
    pub status_code: Option<i32>,
    pub attempt: i32,
    pub request_payload: String,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub triggered_by: String,
}

impl From<webhook_execution::Model> for ExecutionResponse {
    fn from(e: webhook_execution::Model) -> Self {
        Self {
            id: e.id,
            webhook_id: e.webhook_id,
            executed_at: e.executed_at.to_rfc3339(),
            success: e.success,
            status_code: e.status_code,
            attempt: e.attempt,
            request_payload: e.request_payload,
            response_body: e.response_body,
            error: e.error,
            duration_ms: e.duration_ms,
            triggered_by: e.triggered_by,
        }
    }
}

/// Delivery statistics over a time window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatsResponse {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub last_execution: Option<ExecutionResponse>,
}

/// Service for managing webhooks.
///
/// Lookups and duplicate checks go through the [`SubscriptionStore`](super::SubscriptionStore);
/// writes go to the repository.
#[derive(Clone)]
pub struct WebhookService {
    webhook_repo: WebhookRepository,
    subscriptions: SubscriptionStoreRef,
    history: ExecutionHistoryStoreRef,
    dispatcher: WebhookDispatcher,
    id_gen: IdGenerator,
}

impl WebhookService {
    /// Create a new webhook service.
    #[must_use]
    pub const fn new(
        webhook_repo: WebhookRepository,
        subscriptions: SubscriptionStoreRef,
        history: ExecutionHistoryStoreRef,
        dispatcher: WebhookDispatcher,
    ) -> Self {
        Self {
            webhook_repo,
            subscriptions,
            history,
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &EventCatalog {
        self.dispatcher.catalog()
    }

    // ==================== Management ====================

    /// List all webhooks.
    pub async fn list(&self) -> AppResult<Vec<WebhookResponse>> {
        let webhooks = self.webhook_repo.find_all().await?;
        Ok(webhooks.into_iter().map(Into::into).collect())
    }

    /// Get a webhook by ID.
    pub async fn get(&self, webhook_id: &str) -> AppResult<WebhookResponse> {
        Ok(self.require(webhook_id).await?.into())
    }

    /// Create a new webhook.
    pub async fn create(&self, input: CreateWebhookInput, actor: &str) -> AppResult<WebhookResponse> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.check_event(&input.event_code)?;
        check_url(&input.url)?;
        check_headers(&input.headers)?;

        if input.is_active {
            self.check_duplicate(&input.event_code, &input.url, None)
                .await?;
        }

        let model = webhook::ActiveModel {
            id: Set(self.id_gen.generate()),
            event_code: Set(input.event_code),
            url: Set(input.url),
            method: Set(input.method),
            headers: Set(json!(input.headers)),
            is_active: Set(input.is_active),
            created_by: Set(actor.to_string()),
            created_at: Set(chrono::Utc::now().into()),
            updated_by: Set(None),
            updated_at: Set(None),
        };

        let webhook = self.webhook_repo.create(model).await?;
        tracing::info!(
            webhook_id = %webhook.id,
            event = %webhook.event_code,
            actor = %actor,
            "Webhook created"
        );
        Ok(webhook.into())
    }

    /// Update a webhook.
    pub async fn update(
        &self,
        webhook_id: &str,
        input: UpdateWebhookInput,
        actor: &str,
    ) -> AppResult<WebhookResponse> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let webhook = self.require(webhook_id).await?;

        if let Some(event_code) = &input.event_code {
            self.check_event(event_code)?;
        }
        if let Some(url) = &input.url {
            check_url(url)?;
        }
        if let Some(headers) = &input.headers {
            check_headers(headers)?;
        }

        let event_code = input.event_code.as_deref().unwrap_or(&webhook.event_code);
        let url = input.url.as_deref().unwrap_or(&webhook.url);
        if input.is_active.unwrap_or(webhook.is_active) {
            self.check_duplicate(event_code, url, Some(webhook_id))
                .await?;
        }

        let mut active: webhook::ActiveModel = webhook.into();

        if let Some(event_code) = input.event_code {
            active.event_code = Set(event_code);
        }
        if let Some(url) = input.url {
            active.url = Set(url);
        }
        if let Some(method) = input.method {
            active.method = Set(method);
        }
        if let Some(headers) = input.headers {
            active.headers = Set(json!(headers));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_by = Set(Some(actor.to_string()));
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        let updated = self.webhook_repo.update(active).await?;
        Ok(updated.into())
    }

    /// Activate or deactivate a webhook.
    pub async fn set_active(
        &self,
        webhook_id: &str,
        is_active: bool,
        actor: &str,
    ) -> AppResult<WebhookResponse> {
        if is_active {
            let webhook = self.require(webhook_id).await?;
            self.check_duplicate(&webhook.event_code, &webhook.url, Some(webhook_id))
                .await?;
        }
        let updated = self
            .webhook_repo
            .set_active(webhook_id, is_active, actor)
            .await?;
        Ok(updated.into())
    }

    /// Delete a webhook together with its history.
    pub async fn delete(&self, webhook_id: &str) -> AppResult<()> {
        self.webhook_repo.delete(webhook_id).await?;
        tracing::info!(webhook_id = %webhook_id, "Webhook deleted");
        Ok(())
    }

    // ==================== Delivery ====================

    /// Send a test payload to one webhook. Defaults to `{ "test": true }`.
    pub async fn test(
        &self,
        webhook_id: &str,
        payload: Option<Value>,
        actor: &str,
        cancel: &CancelSignal,
    ) -> AppResult<DeliveryOutcome> {
        let payload = payload.unwrap_or_else(|| json!({ "test": true }));
        self.dispatcher
            .dispatch_one(
                webhook_id,
                &payload,
                Trigger::Test {
                    actor: actor.to_string(),
                },
                cancel,
            )
            .await
    }

    /// Fan an event out to its subscribers.
    pub async fn dispatch_event(
        &self,
        event_code: &str,
        payload: &Value,
        cancel: &CancelSignal,
    ) -> AppResult<Vec<DeliveryOutcome>> {
        self.dispatcher
            .dispatch_for_event(event_code, payload, cancel)
            .await
    }

    // ==================== History ====================

    /// Paginated execution history, newest first.
    pub async fn history(
        &self,
        webhook_id: &str,
        page: PageRequest,
    ) -> AppResult<Page<ExecutionResponse>> {
        self.require(webhook_id).await?;
        let (items, total) = self.history.find_by_webhook_id(webhook_id, page).await?;
        Ok(Page::new(items, total, page).map(Into::into))
    }

    /// Success statistics over the last `days` days (1 to [`MAX_STATS_DAYS`]).
    pub async fn stats(&self, webhook_id: &str, days: Option<u32>) -> AppResult<WebhookStatsResponse> {
        self.require(webhook_id).await?;

        let days = days
            .unwrap_or(DEFAULT_STATS_DAYS)
            .clamp(1, MAX_STATS_DAYS);
        let from = chrono::Utc::now() - chrono::Duration::days(i64::from(days));
        let stats = self.history.stats(webhook_id, from).await?;
        let last = self.history.find_last(webhook_id).await?;

        Ok(WebhookStatsResponse {
            total: stats.total,
            successful: stats.successful,
            failed: stats.failed(),
            success_rate: stats.success_rate(),
            last_execution: last.map(Into::into),
        })
    }

    // ==================== Helper Methods ====================

    async fn require(&self, webhook_id: &str) -> AppResult<webhook::Model> {
        self.subscriptions
            .find_by_id(webhook_id)
            .await?
            .ok_or_else(|| AppError::WebhookNotFound(webhook_id.to_string()))
    }

    fn check_event(&self, event_code: &str) -> AppResult<()> {
        self.catalog().require(event_code).map(|_| ())
    }

    async fn check_duplicate(
        &self,
        event_code: &str,
        url: &str,
        exclude_id: Option<&str>,
    ) -> AppResult<()> {
        if self
            .subscriptions
            .exists_duplicate(event_code, url, exclude_id)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "An active webhook for {event_code} already targets {url}"
            )));
        }
        Ok(())
    }
}

fn check_url(raw: &str) -> AppResult<()> {
    let url = url::Url::parse(raw).map_err(|e| AppError::Validation(format!("Invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn check_headers(headers: &[WebhookHeader]) -> AppResult<()> {
    for header in headers {
        if header.field.trim().is_empty() {
            return Err(AppError::Validation(
                "Header name must not be empty".to_string(),
            ));
        }
        HeaderName::from_bytes(header.field.as_bytes())
            .map_err(|_| AppError::Validation(format!("Invalid header name: {}", header.field)))?;
        HeaderValue::from_str(&header.value).map_err(|_| {
            AppError::Validation(format!("Invalid value for header {}", header.field))
        })?;
    }
    Ok(())
}
