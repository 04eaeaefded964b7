//! Event catalog and manual dispatch endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use backoffice_common::AppResult;
use backoffice_core::{DeliveryOutcome, EventCategory, SystemEvent};
use serde::Serialize;
use serde_json::Value;

use crate::{extractors::AuthAdmin, middleware::AppState};

/// A category with its events.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    #[serde(flatten)]
    pub category: EventCategory,
    pub events: Vec<SystemEvent>,
}

/// List the event catalog grouped by category.
async fn list_events(
    AuthAdmin(_admin): AuthAdmin,
    State(state): State<AppState>,
) -> Json<Vec<CategoryResponse>> {
    let catalog = state.webhook_service.catalog();
    let categories = catalog
        .categories()
        .iter()
        .map(|category| CategoryResponse {
            category: category.clone(),
            events: catalog
                .events_in_category(category.code)
                .into_iter()
                .cloned()
                .collect(),
        })
        .collect();
    Json(categories)
}

/// Deliver an event to every active subscriber.
async fn dispatch_event(
    AuthAdmin(admin): AuthAdmin,
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Vec<DeliveryOutcome>>> {
    tracing::info!(event = %code, actor = %admin.name, "Manual event dispatch");
    let outcomes = state
        .webhook_service
        .dispatch_event(&code, &payload, &state.shutdown)
        .await?;
    Ok(Json(outcomes))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/{code}/dispatch", post(dispatch_event))
}
