//! API endpoint handlers.
//!
//! One module per resource. Handlers check the caller's role, open a
//! connection, and delegate to the domain modules.

pub mod admissions;
pub mod appointments;
pub mod beds;
pub mod health;
pub mod pharmacy;
pub mod slots;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path segment as an entity id.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}

/// Wall-clock time of the hospital (server local time).
pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
