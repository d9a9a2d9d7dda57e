//! # Request Context
//!
//! Who is calling, resolved once per request.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request ──► request_span ──► authenticate ──► handler                 │
//! │              (request id)     │                 │                       │
//! │                               │ Bearer JWT      │ ctx.require(perm)?    │
//! │                               │ → users row     │                       │
//! │                               ▼                 ▼                       │
//! │                        extensions: RequestContext                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The role is read from the users row, not from the token, so a demoted or
//! deactivated user loses access on their next request.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use std::time::Instant;
use stockbook_core::{Permission, Role};
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::auth::extract_bearer_token;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl RequestContext {
    pub fn new(user_id: i64, username: impl Into<String>, role: Role) -> Self {
        RequestContext {
            user_id,
            username: username.into(),
            role,
            permissions: role.permissions(),
        }
    }

    /// Fails with 403 unless the caller holds `permission`.
    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        if self.permissions.contains(&permission) {
            Ok(())
        } else {
            debug!(user = %self.username, %permission, "Permission denied");
            Err(ApiError::forbidden(permission))
        }
    }

    /// Name recorded on ledger rows and vouchers.
    pub fn actor(&self) -> &str {
        &self.username
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthenticated("Authentication required"))
    }
}

/// Resolves the bearer token into a [`RequestContext`] extension.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthenticated("Missing Authorization header"))?;
    let token = extract_bearer_token(header)
        .ok_or_else(|| ApiError::unauthenticated("Expected a Bearer token"))?;

    let claims = state.jwt.validate(token)?;
    let user = state
        .db
        .users()
        .get(claims.user_id()?)
        .await
        .map_err(|_| ApiError::unauthenticated("Unknown user"))?;
    if !user.is_active {
        return Err(ApiError::unauthenticated("User is deactivated"));
    }

    tracing::Span::current().record("user", user.username.as_str());
    req.extensions_mut()
        .insert(RequestContext::new(user.id, user.username, user.role));

    Ok(next.run(req).await)
}

/// Wraps each request in a span carrying a fresh request id.
pub async fn request_span(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        %request_id,
        method = %req.method(),
        path = %req.uri().path(),
        user = tracing::field::Empty,
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(req).await;
        debug!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request finished"
        );
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_follows_role() {
        let clerk = RequestContext::new(3, "carol", Role::Clerk);
        assert!(clerk.require(Permission::TransactionsWrite).is_ok());
        let err = clerk.require(Permission::Settings).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Forbidden);

        let admin = RequestContext::new(1, "admin", Role::Admin);
        assert!(admin.require(Permission::Settings).is_ok());
        assert_eq!(admin.actor(), "admin");
    }
}
