//! HTTP API layer for the back-office webhook engine.
//!
//! - **Endpoints**: webhook administration, history, statistics, event catalog
//! - **Extractors**: authenticated administrator
//! - **Middleware**: bearer API key authentication
//!
//! Built on Axum 0.8. Routes are relative; the server nests them under `/api`.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AdminKeys, AppState, auth_middleware};

use axum::Router;

/// Full application router: `/api` routes behind admin key authentication.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
