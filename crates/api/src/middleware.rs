//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use backoffice_common::config::AdminApiKey;
use backoffice_core::{CancelSignal, WebhookService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub webhook_service: WebhookService,
    pub admin_keys: AdminKeys,
    /// Fires when the server begins shutting down.
    pub shutdown: CancelSignal,
}

/// Identity of an authenticated administrator, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    /// Name of the API key that authenticated the request.
    pub name: String,
}

/// Configured administrative API keys.
#[derive(Debug, Clone, Default)]
pub struct AdminKeys {
    keys: Arc<Vec<AdminApiKey>>,
}

impl AdminKeys {
    #[must_use]
    pub fn new(keys: Vec<AdminApiKey>) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    /// Resolve a presented key to its identity.
    #[must_use]
    pub fn authenticate(&self, presented: &str) -> Option<AdminIdentity> {
        self.keys
            .iter()
            .find(|k| !k.key.is_empty() && constant_time_eq(k.key.as_bytes(), presented.as_bytes()))
            .map(|k| AdminIdentity {
                name: k.name.clone(),
            })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Authentication middleware.
///
/// Attaches an [`AdminIdentity`] when the bearer key matches; handlers
/// reject requests without one through the `AuthAdmin` extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(req.headers()) {
        match state.admin_keys.authenticate(token) {
            Some(identity) => {
                req.extensions_mut().insert(identity);
            }
            None => tracing::debug!(path = %req.uri().path(), "Rejected unknown admin API key"),
        }
    }

    next.run(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys() -> AdminKeys {
        AdminKeys::new(vec![
            AdminApiKey {
                name: "ops".to_string(),
                key: "k-ops".to_string(),
            },
            AdminApiKey {
                name: "disabled".to_string(),
                key: String::new(),
            },
        ])
    }

    #[test]
    fn test_authenticate() {
        let keys = keys();

        assert_eq!(keys.authenticate("k-ops").map(|i| i.name), Some("ops".to_string()));
        assert!(keys.authenticate("k-op").is_none());
        assert!(keys.authenticate("").is_none());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, "Bearer k-ops".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("k-ops"));
    }
}
