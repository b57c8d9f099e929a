//! Request extractors whose rejections use the API error envelope.
//!
//! axum's own `Json` and `Query` reject with a plain-text 4xx; these
//! wrappers turn a malformed body or query string into `400 BAD_REQUEST`.

use axum::extract::{FromRequest, FromRequestParts};

use crate::api::error::ApiError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
