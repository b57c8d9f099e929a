//! Bed register endpoints.
//!
//! - `GET /api/beds?status=&ward=`: list active beds
//! - `POST /api/beds`: register a bed
//! - `PUT /api/beds/:id/status`: maintenance, reserved or available

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::types::{ApiContext, StaffContext};
use crate::authorization::Action;
use crate::bed_allocation::{self, RegisterBedRequest};
use crate::db::BedFilter;
use crate::models::enums::BedStatus;
use crate::models::Bed;

#[derive(Deserialize)]
pub struct BedsQuery {
    pub status: Option<BedStatus>,
    pub ward: Option<String>,
}

#[derive(Serialize)]
pub struct BedsResponse {
    pub beds: Vec<Bed>,
}

/// `GET /api/beds`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    ApiQuery(query): ApiQuery<BedsQuery>,
) -> Result<Json<BedsResponse>, ApiError> {
    staff.require(Action::ViewBeds)?;
    let filter = BedFilter {
        status: query.status,
        ward: query.ward,
    };
    let beds = ctx
        .with_db(move |conn| bed_allocation::list_beds(conn, &filter))
        .await?;
    Ok(Json(BedsResponse { beds }))
}

/// `POST /api/beds`
pub async fn register(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    ApiJson(req): ApiJson<RegisterBedRequest>,
) -> Result<(StatusCode, Json<Bed>), ApiError> {
    staff.require(Action::ManageBeds)?;
    let bed = ctx
        .with_db(move |conn| bed_allocation::register_bed(conn, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(bed)))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BedStatus,
}

/// `PUT /api/beds/:id/status`
pub async fn set_status(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<Bed>, ApiError> {
    staff.require(Action::ManageBeds)?;
    let bed_id = parse_id(&id, "bed")?;
    let bed = ctx
        .with_db(move |conn| bed_allocation::set_bed_status(conn, &bed_id, req.status))
        .await?;
    Ok(Json(bed))
}
