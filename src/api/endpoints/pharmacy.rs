//! Prescription, dispensing and stock endpoints.
//!
//! - `POST /api/prescriptions`: write a prescription
//! - `GET /api/prescriptions/:id`: prescription with items
//! - `POST /api/prescriptions/:id/dispense`: all lines or nothing
//! - `GET /api/prescriptions/:id/dispensings`
//! - `POST /api/prescriptions/:id/{complete,cancel}`
//! - `POST /api/inventory`: receive a batch
//! - `GET /api/inventory/:medication_id`: usable batches, FIFO
//! - `GET /api/inventory/:medication_id/pick?quantity=`: FIFO pick plan

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{now, parse_id};
use crate::api::error::ApiError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::types::{ApiContext, StaffContext};
use crate::authorization::Action;
use crate::dispensing::{
    self, CreatePrescriptionRequest, DispenseLine, ReceiveBatchRequest, StockPick,
};
use crate::models::{Dispensing, InventoryBatch, Prescription};

// ── Prescriptions ───────────────────────────────────────────

/// `POST /api/prescriptions`. A doctor's own practitioner record is the
/// default prescriber when the body names none.
pub async fn create_prescription(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    ApiJson(mut req): ApiJson<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    staff.require(Action::Prescribe)?;
    if req.prescriber_id.is_none() {
        req.prescriber_id = staff.practitioner_id;
    }
    let rx = ctx
        .with_db(move |conn| dispensing::create_prescription(conn, &req, now()))
        .await?;
    Ok((StatusCode::CREATED, Json(rx)))
}

/// `GET /api/prescriptions/:id`
pub async fn prescription(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    staff.require(Action::ViewPharmacy)?;
    let id = parse_id(&id, "prescription")?;
    let rx = ctx
        .with_db(move |conn| dispensing::get_prescription(conn, &id))
        .await?;
    Ok(Json(rx))
}

#[derive(Deserialize)]
pub struct DispenseRequest {
    pub lines: Vec<DispenseLine>,
}

#[derive(Serialize)]
pub struct DispensingsResponse {
    pub dispensings: Vec<Dispensing>,
}

/// `POST /api/prescriptions/:id/dispense`
pub async fn dispense(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DispenseRequest>,
) -> Result<(StatusCode, Json<DispensingsResponse>), ApiError> {
    staff.require(Action::Dispense)?;
    let id = parse_id(&id, "prescription")?;
    let actor = staff.actor();
    let dispensings = ctx
        .with_db(move |conn| dispensing::dispense(conn, &id, &req.lines, &actor, now()))
        .await?;
    Ok((StatusCode::CREATED, Json(DispensingsResponse { dispensings })))
}

/// `GET /api/prescriptions/:id/dispensings`
pub async fn dispensings(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<DispensingsResponse>, ApiError> {
    staff.require(Action::ViewPharmacy)?;
    let id = parse_id(&id, "prescription")?;
    let dispensings = ctx
        .with_db(move |conn| dispensing::list_dispensings(conn, &id))
        .await?;
    Ok(Json(DispensingsResponse { dispensings }))
}

/// `POST /api/prescriptions/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    staff.require(Action::Dispense)?;
    let id = parse_id(&id, "prescription")?;
    let rx = ctx
        .with_db(move |conn| dispensing::complete_prescription(conn, &id))
        .await?;
    Ok(Json(rx))
}

/// `POST /api/prescriptions/:id/cancel`: prescriber or pharmacist.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    staff
        .require(Action::Prescribe)
        .or_else(|_| staff.require(Action::Dispense))?;
    let id = parse_id(&id, "prescription")?;
    let rx = ctx
        .with_db(move |conn| dispensing::cancel_prescription(conn, &id))
        .await?;
    Ok(Json(rx))
}

// ── Inventory ───────────────────────────────────────────────

/// `POST /api/inventory`
pub async fn receive(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    ApiJson(req): ApiJson<ReceiveBatchRequest>,
) -> Result<(StatusCode, Json<InventoryBatch>), ApiError> {
    staff.require(Action::ManageInventory)?;
    let batch = ctx
        .with_db(move |conn| dispensing::receive_batch(conn, &req, now().date()))
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

#[derive(Serialize)]
pub struct StockResponse {
    pub total: u64,
    pub batches: Vec<InventoryBatch>,
}

/// `GET /api/inventory/:medication_id`
pub async fn stock(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(medication_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    staff.require(Action::ViewPharmacy)?;
    let medication_id = parse_id(&medication_id, "medication")?;
    let batches = ctx
        .with_db(move |conn| dispensing::list_stock_fifo(conn, &medication_id, now().date()))
        .await?;
    let total = batches.iter().map(|b| u64::from(b.quantity)).sum();
    Ok(Json(StockResponse { total, batches }))
}

#[derive(Deserialize)]
pub struct PickQuery {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct PickResponse {
    pub picks: Vec<StockPick>,
}

/// `GET /api/inventory/:medication_id/pick?quantity=`
pub async fn pick(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(medication_id): Path<String>,
    ApiQuery(query): ApiQuery<PickQuery>,
) -> Result<Json<PickResponse>, ApiError> {
    staff.require(Action::ViewPharmacy)?;
    let medication_id = parse_id(&medication_id, "medication")?;
    let picks = ctx
        .with_db(move |conn| {
            dispensing::pick_fifo(conn, &medication_id, query.quantity, now().date())
        })
        .await?;
    Ok(Json(PickResponse { picks }))
}
