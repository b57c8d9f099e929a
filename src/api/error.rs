//! API error types with structured JSON responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::admission::AdmissionError;
use crate::appointment::SchedulingError;
use crate::authorization::AuthorizationError;
use crate::bed_allocation::BedError;
use crate::core_state::CoreError;
use crate::dispensing::DispenseError;
use crate::slots::SlotError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    /// The request was well-formed but the current state refuses it
    /// (slot taken, bed occupied, not enough stock).
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Precondition(detail) => {
                (StatusCode::BAD_REQUEST, "PRECONDITION_FAILED", detail)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

// ── Extractor rejections ────────────────────────────────────

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ── Conversions from domain errors ──────────────────────────

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        match err {
            crate::db::DatabaseError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<SlotError> for ApiError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::Database(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        use SchedulingError::*;
        match err {
            Database(e) => e.into(),
            PatientNotFound(_) | PractitionerNotFound(_) | AppointmentNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            TimeSlotNotAvailable => ApiError::Precondition(err.to_string()),
            InvalidAppointmentTime(_)
            | PastAppointmentDate(_)
            | InvalidDuration(_)
            | TerminalState(_)
            | InvalidTransition { .. }
            | MissingCancellationReason => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<BedError> for ApiError {
    fn from(err: BedError) -> Self {
        use BedError::*;
        match err {
            Database(e) => e.into(),
            BedNotFound(_) | AdmissionNotFound(_) | AllocationNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            BedNotAvailable { .. }
            | BedOccupied(_)
            | DuplicateBedNumber(_)
            | AdmissionAlreadyAllocated(_)
            | AllocationAlreadyReleased(_) => ApiError::Precondition(err.to_string()),
            InvalidStatusChange(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        use AdmissionError::*;
        match err {
            Database(e) => e.into(),
            Bed(e) => e.into(),
            VisitNotFound(_) | AdmissionNotFound(_) => ApiError::NotFound(err.to_string()),
            AdmissionNotActive(_) | SameBed => ApiError::Precondition(err.to_string()),
            MissingField(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<DispenseError> for ApiError {
    fn from(err: DispenseError) -> Self {
        use DispenseError::*;
        match err {
            Database(e) => e.into(),
            PrescriptionNotFound(_)
            | PrescriptionItemNotFound(_)
            | InventoryNotFound(_)
            | MedicationNotFound(_)
            | VisitNotFound(_)
            | PractitionerNotFound(_) => ApiError::NotFound(err.to_string()),
            PrescriptionNotDispensable(_)
            | MedicationMismatch { .. }
            | InsufficientStock { .. }
            | ExpiredStock { .. }
            | QuantityExceedsPrescribed { .. }
            | DuplicateBatch(_) => ApiError::Precondition(err.to_string()),
            EmptyRequest | InvalidQuantity | InvalidStatusChange { .. } => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use chrono::NaiveDate;
    use uuid::Uuid;

    use crate::authorization::Action;
    use crate::models::enums::{AppointmentStatus, StaffRole};

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn forbidden_role_returns_403() {
        let api_err: ApiError = AuthorizationError::Forbidden {
            role: StaffRole::Pharmacist,
            action: Action::ManageBeds,
        }
        .into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn missing_entities_return_404() {
        let api_err: ApiError = SchedulingError::PatientNotFound(Uuid::new_v4()).into();
        assert_eq!(api_err.into_response().status(), StatusCode::NOT_FOUND);

        let api_err: ApiError = DispenseError::InventoryNotFound(Uuid::new_v4()).into();
        assert_eq!(api_err.into_response().status(), StatusCode::NOT_FOUND);

        let api_err: ApiError = AdmissionError::Bed(BedError::BedNotFound(Uuid::new_v4())).into();
        assert_eq!(api_err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preconditions_return_400_with_reason() {
        let api_err: ApiError = DispenseError::InsufficientStock {
            available: 3,
            requested: 10,
        }
        .into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "PRECONDITION_FAILED");
        assert_eq!(
            json["error"]["message"],
            "Insufficient stock: 3 available, 10 requested"
        );
    }

    #[tokio::test]
    async fn validation_errors_return_400() {
        let api_err: ApiError =
            SchedulingError::PastAppointmentDate(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
                .into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");

        let api_err: ApiError = SchedulingError::TerminalState(AppointmentStatus::Cancelled).into();
        assert_eq!(api_err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let api_err: ApiError =
            crate::db::DatabaseError::ConstraintViolation("disk I/O".into()).into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
