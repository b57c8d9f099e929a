//! Access logging middleware.
//!
//! Emits one `tracing` event per request with staff id, method, path,
//! response status and latency. Runs innermost (after auth has injected
//! `StaffContext`).

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::StaffContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let staff = req
        .extensions()
        .get::<StaffContext>()
        .map(|s| s.staff_id.to_string())
        .unwrap_or_else(|| "anonymous".into());
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        path,
        staff,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "API access"
    );
    response
}
