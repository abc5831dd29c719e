//! services/api/src/web/middleware.rs
//!
//! Authentication, request deadline and error-detail middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use marketplace_core::{ErrorKind, ServiceError};
use std::sync::Arc;
use tracing::warn;

use crate::error::{ApiError, ErrorBody, ErrorDetail};
use crate::web::state::AppState;

/// Middleware that validates the bearer access token and its session.
///
/// If valid, inserts the caller's `AuthContext` into request extensions for handlers
/// to use. If invalid, missing, or the session is gone, returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .ok_or(ServiceError::Unauthenticated)?;

    let ctx = state.auth.authenticate(&token).await?;
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Fails the request with 504 once the configured deadline passes. Dropping the
/// handler future cancels every downstream call it was awaiting.
pub async fn enforce_deadline(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match tokio::time::timeout(state.config.request_timeout, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, %path, "request deadline exceeded");
            ApiError::from(ServiceError::Timeout).into_response()
        }
    }
}

/// Replaces the generic message of an internal error with its detail.
/// Only layered when `HTTP_DEBUG_ERRORS` is enabled.
pub async fn expose_error_details(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let body = ErrorBody {
        error: ErrorKind::Internal.code().to_string(),
        message: detail,
    };
    (response.status(), Json(body)).into_response()
}
