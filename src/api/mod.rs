//! HTTP API.
//!
//! Exposes scheduling, bed management and pharmacy operations as JSON
//! endpoints under `/api/`. Every route except `/api/health` requires a
//! staff bearer token; handlers then check the caller's role.
//!
//! The router is composable: `his_api_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::his_api_router;
pub use server::{bootstrap_admin, start_server, HisServer, ServerError};
pub use types::{ApiContext, StaffContext};
