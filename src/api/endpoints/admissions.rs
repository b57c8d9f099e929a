//! Admission endpoints.
//!
//! - `POST /api/admissions`: admit, optionally straight into a bed
//! - `GET /api/admissions/:id`: admission with its current bed
//! - `POST /api/admissions/:id/discharge`
//! - `POST /api/admissions/:id/transfer-bed`
//! - `POST /api/admissions/:id/transfer-out`
//! - `POST /api/admissions/:id/notes`, `GET /api/admissions/:id/notes`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{now, parse_id};
use crate::admission::{
    self, AdmissionDetail, CreateAdmissionRequest, DischargeRequest, TransferBedRequest,
    TransferOutRequest,
};
use crate::api::error::ApiError;
use crate::api::extract::ApiJson;
use crate::api::types::{ApiContext, StaffContext};
use crate::authorization::Action;
use crate::models::{Admission, BedAllocation, NursingNote};

/// `POST /api/admissions`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    ApiJson(req): ApiJson<CreateAdmissionRequest>,
) -> Result<(StatusCode, Json<AdmissionDetail>), ApiError> {
    staff.require(Action::ManageAdmissions)?;
    let actor = staff.actor();
    let detail = ctx
        .with_db(move |conn| admission::create_admission(conn, &req, &actor, now()))
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `GET /api/admissions/:id`: accepts a UUID or an `ADM-` code.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<AdmissionDetail>, ApiError> {
    staff.require(Action::ViewAdmissions)?;
    let detail = ctx
        .with_db(move |conn| {
            let id = match Uuid::parse_str(&id) {
                Ok(uuid) => uuid,
                Err(_) => admission::get_by_code(conn, &id)?.id,
            };
            admission::get(conn, &id)
        })
        .await?;
    Ok(Json(detail))
}

#[derive(Serialize)]
pub struct ActiveAdmissionsResponse {
    pub admissions: Vec<Admission>,
}

/// `GET /api/admissions`: currently admitted patients.
pub async fn list_active(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
) -> Result<Json<ActiveAdmissionsResponse>, ApiError> {
    staff.require(Action::ViewAdmissions)?;
    let admissions = ctx.with_db(admission::list_active).await?;
    Ok(Json(ActiveAdmissionsResponse { admissions }))
}

/// `POST /api/admissions/:id/discharge`
pub async fn discharge(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DischargeRequest>,
) -> Result<Json<Admission>, ApiError> {
    staff.require(Action::ManageAdmissions)?;
    let id = parse_id(&id, "admission")?;
    let discharged = ctx
        .with_db(move |conn| admission::discharge(conn, &id, &req, now()))
        .await?;
    Ok(Json(discharged))
}

/// `POST /api/admissions/:id/transfer-bed`
pub async fn transfer_bed(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<TransferBedRequest>,
) -> Result<Json<BedAllocation>, ApiError> {
    staff.require(Action::ManageAdmissions)?;
    let id = parse_id(&id, "admission")?;
    let actor = staff.actor();
    let allocation = ctx
        .with_db(move |conn| admission::transfer_bed(conn, &id, &req, &actor, now()))
        .await?;
    Ok(Json(allocation))
}

/// `POST /api/admissions/:id/transfer-out`
pub async fn transfer_out(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<TransferOutRequest>,
) -> Result<Json<Admission>, ApiError> {
    staff.require(Action::ManageAdmissions)?;
    let id = parse_id(&id, "admission")?;
    let transferred = ctx
        .with_db(move |conn| admission::transfer_out(conn, &id, &req, now()))
        .await?;
    Ok(Json(transferred))
}

#[derive(Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Serialize)]
pub struct NotesResponse {
    pub notes: Vec<NursingNote>,
}

/// `POST /api/admissions/:id/notes`
pub async fn add_note(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<NoteRequest>,
) -> Result<(StatusCode, Json<NursingNote>), ApiError> {
    staff.require(Action::RecordNursingNotes)?;
    let id = parse_id(&id, "admission")?;
    let actor = staff.actor();
    let note = ctx
        .with_db(move |conn| admission::add_nursing_note(conn, &id, &req.note, &actor, now()))
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// `GET /api/admissions/:id/notes`
pub async fn notes(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<NotesResponse>, ApiError> {
    staff.require(Action::ViewAdmissions)?;
    let id = parse_id(&id, "admission")?;
    let notes = ctx
        .with_db(move |conn| admission::list_nursing_notes(conn, &id))
        .await?;
    Ok(Json(NotesResponse { notes }))
}
