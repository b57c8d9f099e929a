//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves the active staff
//! account by token hash, and injects `StaffContext` into request
//! extensions for downstream handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{hash_token, ApiContext, StaffContext};
use crate::db;

/// Require a valid staff bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;
    let hash = hash_token(token);

    // Connection is dropped before the handler runs.
    let account = ctx
        .with_db(move |conn| db::find_staff_by_token_hash(conn, &hash))
        .await?;
    let Some(account) = account else {
        tracing::warn!("Rejected unknown bearer token");
        return Err(ApiError::Unauthorized);
    };

    req.extensions_mut().insert(StaffContext::from(account));

    Ok(next.run(req).await)
}
