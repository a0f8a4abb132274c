//! Request extractors
//!
//! User authentication is terminated at the edge proxy, which forwards
//! the verified identity in the `x-user-id` header. Handlers that require
//! a user take [`AuthenticatedUser`] and reject with 401 when the header
//! is missing or malformed.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use serde_json::{json, Value};

/// Identity of the authenticated dashboard user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: u64,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Unauthenticated" } })),
            ))?;

        Ok(AuthenticatedUser { user_id })
    }
}
