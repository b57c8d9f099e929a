//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! Extension → Cache-Control → Auth validator → Access logger → Handler

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the HIS API router.
///
/// Every route except `/api/health` requires a staff bearer token.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn his_api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    use endpoints::{admissions, appointments, beds, pharmacy, slots};

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/appointments", post(appointments::create).get(appointments::list))
        .route("/appointments/:id", get(appointments::detail))
        .route("/appointments/:id/reschedule", put(appointments::reschedule))
        .route("/appointments/:id/cancel", post(appointments::cancel))
        .route("/appointments/:id/confirm", post(appointments::confirm))
        .route("/appointments/:id/start", post(appointments::start))
        .route("/appointments/:id/complete", post(appointments::complete))
        .route("/appointments/:id/no-show", post(appointments::no_show))
        .route("/practitioners/:id/slots", get(slots::open_slots))
        .route("/beds", get(beds::list).post(beds::register))
        .route("/beds/:id/status", put(beds::set_status))
        .route("/admissions", post(admissions::create).get(admissions::list_active))
        .route("/admissions/:id", get(admissions::detail))
        .route("/admissions/:id/discharge", post(admissions::discharge))
        .route("/admissions/:id/transfer-bed", post(admissions::transfer_bed))
        .route("/admissions/:id/transfer-out", post(admissions::transfer_out))
        .route(
            "/admissions/:id/notes",
            post(admissions::add_note).get(admissions::notes),
        )
        .route("/prescriptions", post(pharmacy::create_prescription))
        .route("/prescriptions/:id", get(pharmacy::prescription))
        .route("/prescriptions/:id/dispense", post(pharmacy::dispense))
        .route("/prescriptions/:id/dispensings", get(pharmacy::dispensings))
        .route("/prescriptions/:id/complete", post(pharmacy::complete))
        .route("/prescriptions/:id/cancel", post(pharmacy::cancel))
        .route("/inventory", post(pharmacy::receive))
        .route("/inventory/:medication_id", get(pharmacy::stock))
        .route("/inventory/:medication_id/pick", get(pharmacy::pick))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Patient data must not be cached by intermediaries
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", protected).nest("/api", public)
}
