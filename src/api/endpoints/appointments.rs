//! Appointment endpoints.
//!
//! - `POST /api/appointments`: book
//! - `GET /api/appointments?practitioner_id=&date=` or `?patient_id=`: list
//! - `GET /api/appointments/:id`: by id or appointment code
//! - `PUT /api/appointments/:id/reschedule`
//! - `POST /api/appointments/:id/cancel`
//! - `POST /api/appointments/:id/{confirm,start,complete,no-show}`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{now, parse_id};
use crate::api::error::ApiError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::types::{ApiContext, StaffContext};
use crate::appointment::{self, RescheduleRequest, ScheduleRequest};
use crate::authorization::Action;
use crate::models::Appointment;

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

/// `POST /api/appointments`: book a new appointment.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    ApiJson(req): ApiJson<ScheduleRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    staff.require(Action::ManageAppointments)?;
    let actor = staff.actor();
    let appt = ctx
        .with_db(move |conn| appointment::schedule(conn, &req, &actor, now()))
        .await?;
    Ok((StatusCode::CREATED, Json(appt)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub practitioner_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub patient_id: Option<Uuid>,
}

/// `GET /api/appointments`: a practitioner's day or a patient's history.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    staff.require(Action::ViewSchedule)?;

    let appointments = match query {
        ListQuery {
            practitioner_id: Some(practitioner_id),
            date: Some(date),
            ..
        } => {
            ctx.with_db(move |conn| appointment::list_for_practitioner(conn, &practitioner_id, &date))
                .await?
        }
        ListQuery {
            patient_id: Some(patient_id),
            ..
        } => {
            ctx.with_db(move |conn| appointment::list_for_patient(conn, &patient_id))
                .await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Provide practitioner_id and date, or patient_id".into(),
            ))
        }
    };

    Ok(Json(AppointmentsResponse { appointments }))
}

/// `GET /api/appointments/:id`: accepts a UUID or an `APT-` code.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    staff.require(Action::ViewSchedule)?;
    let appt = ctx
        .with_db(move |conn| match Uuid::parse_str(&id) {
            Ok(uuid) => appointment::get(conn, &uuid),
            Err(_) => appointment::get_by_code(conn, &id),
        })
        .await?;
    Ok(Json(appt))
}

/// `PUT /api/appointments/:id/reschedule`
pub async fn reschedule(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RescheduleRequest>,
) -> Result<Json<Appointment>, ApiError> {
    staff.require(Action::ManageAppointments)?;
    let id = parse_id(&id, "appointment")?;
    let actor = staff.actor();
    let appt = ctx
        .with_db(move |conn| appointment::reschedule(conn, &id, &req, &actor, now()))
        .await?;
    Ok(Json(appt))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

/// `POST /api/appointments/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CancelRequest>,
) -> Result<Json<Appointment>, ApiError> {
    staff.require(Action::ManageAppointments)?;
    let id = parse_id(&id, "appointment")?;
    let actor = staff.actor();
    let appt = ctx
        .with_db(move |conn| appointment::cancel(conn, &id, &req.reason, &actor, now()))
        .await?;
    Ok(Json(appt))
}

// ── Status transitions ──────────────────────────────────────

type Transition = fn(
    &rusqlite::Connection,
    &Uuid,
    &str,
    chrono::NaiveDateTime,
) -> Result<Appointment, appointment::SchedulingError>;

async fn transition(
    ctx: ApiContext,
    staff: StaffContext,
    id: String,
    apply: Transition,
) -> Result<Json<Appointment>, ApiError> {
    staff.require(Action::UpdateAppointmentStatus)?;
    let id = parse_id(&id, "appointment")?;
    let actor = staff.actor();
    let appt = ctx.with_db(move |conn| apply(conn, &id, &actor, now())).await?;
    Ok(Json(appt))
}

/// `POST /api/appointments/:id/confirm`
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    transition(ctx, staff, id, appointment::confirm).await
}

/// `POST /api/appointments/:id/start`
pub async fn start(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    transition(ctx, staff, id, appointment::start).await
}

/// `POST /api/appointments/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    transition(ctx, staff, id, appointment::complete).await
}

/// `POST /api/appointments/:id/no-show`
pub async fn no_show(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    transition(ctx, staff, id, appointment::mark_no_show).await
}
