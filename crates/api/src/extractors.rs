//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use backoffice_common::AppError;

use crate::middleware::AdminIdentity;

/// Authenticated administrator extractor.
#[derive(Debug, Clone)]
pub struct AuthAdmin(pub AdminIdentity);

impl<S> FromRequestParts<S> for AuthAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<AdminIdentity>()
            .cloned()
            .map(AuthAdmin)
            .ok_or(AppError::Unauthorized)
    }
}
