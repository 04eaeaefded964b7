//! Webhook endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use backoffice_common::{AppResult, Page, PageQuery};
use backoffice_core::{
    CreateWebhookInput, DeliveryOutcome, ExecutionResponse, UpdateWebhookInput, WebhookResponse,
    WebhookStatsResponse,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    extractors::AuthAdmin,
    middleware::AppState,
    response::{Created, NoContent},
};

/// Body of a test invocation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWebhookRequest {
    /// Sent as-is; `{ "test": true }` when omitted.
    pub test_payload: Option<Value>,
}

/// Request to toggle a webhook.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    pub is_active: bool,
}

/// Statistics window.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Days back from now (default 30).
    pub days: Option<u32>,
}

/// List all webhooks.
async fn list_webhooks(
    AuthAdmin(_admin): AuthAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<WebhookResponse>>> {
    let webhooks = state.webhook_service.list().await?;
    Ok(Json(webhooks))
}

/// Create a new webhook.
async fn create_webhook(
    AuthAdmin(admin): AuthAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateWebhookInput>,
) -> AppResult<Created<WebhookResponse>> {
    let webhook = state.webhook_service.create(input, &admin.name).await?;
    Ok(Created(webhook))
}

/// Get a webhook by ID.
async fn get_webhook(
    AuthAdmin(_admin): AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<WebhookResponse>> {
    let webhook = state.webhook_service.get(&id).await?;
    Ok(Json(webhook))
}

/// Update a webhook.
async fn update_webhook(
    AuthAdmin(admin): AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateWebhookInput>,
) -> AppResult<Json<WebhookResponse>> {
    let webhook = state
        .webhook_service
        .update(&id, input, &admin.name)
        .await?;
    Ok(Json(webhook))
}

/// Delete a webhook and its history.
async fn delete_webhook(
    AuthAdmin(_admin): AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<NoContent> {
    state.webhook_service.delete(&id).await?;
    Ok(NoContent)
}

/// Activate or deactivate a webhook.
async fn set_status(
    AuthAdmin(admin): AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> AppResult<Json<WebhookResponse>> {
    let webhook = state
        .webhook_service
        .set_active(&id, req.is_active, &admin.name)
        .await?;
    Ok(Json(webhook))
}

/// Send a test payload to a webhook, active or not.
async fn test_webhook(
    AuthAdmin(admin): AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Option<Json<TestWebhookRequest>>,
) -> AppResult<Json<DeliveryOutcome>> {
    let payload = req.and_then(|Json(r)| r.test_payload);
    let outcome = state
        .webhook_service
        .test(&id, payload, &admin.name, &state.shutdown)
        .await?;
    Ok(Json(outcome))
}

/// Paginated execution history.
async fn get_history(
    AuthAdmin(_admin): AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<ExecutionResponse>>> {
    let page = state.webhook_service.history(&id, query.into()).await?;
    Ok(Json(page))
}

/// Delivery statistics.
async fn get_stats(
    AuthAdmin(_admin): AuthAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<WebhookStatsResponse>> {
    let stats = state.webhook_service.stats(&id, query.days).await?;
    Ok(Json(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_webhooks).post(create_webhook))
        .route(
            "/{id}",
            get(get_webhook).put(update_webhook).delete(delete_webhook),
        )
        .route("/{id}/status", put(set_status))
        .route("/{id}/test", post(test_webhook))
        .route("/{id}/history", get(get_history))
        .route("/{id}/stats", get(get_stats))
}
