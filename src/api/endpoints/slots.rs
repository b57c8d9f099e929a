//! `GET /api/practitioners/:id/slots?date=&duration=&granularity=`

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::extract::ApiQuery;
use crate::api::types::{ApiContext, StaffContext};
use crate::authorization::Action;
use crate::config;
use crate::db;
use crate::slots::{self, OpenSlot, SlotGrid};

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub duration: Option<u32>,
    pub granularity: Option<u32>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub slots: Vec<OpenSlot>,
}

pub async fn open_slots(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<SlotsQuery>,
) -> Result<Json<SlotsResponse>, ApiError> {
    staff.require(Action::ViewSchedule)?;
    let practitioner_id = parse_id(&id, "practitioner")?;

    let mut grid = SlotGrid::default();
    if let Some(duration) = query.duration {
        if !config::ALLOWED_APPOINTMENT_DURATIONS.contains(&duration) {
            return Err(ApiError::BadRequest(format!(
                "Duration of {duration} minutes is not allowed (15, 30, 45 or 60)"
            )));
        }
        grid.duration_minutes = duration;
    }
    if let Some(granularity) = query.granularity {
        grid.granularity_minutes = granularity;
    }

    let date = query.date;
    let slots = ctx
        .with_db(move |conn| -> Result<Vec<OpenSlot>, ApiError> {
            if db::get_practitioner(conn, &practitioner_id)?.is_none() {
                return Err(ApiError::NotFound(format!(
                    "Practitioner not found: {practitioner_id}"
                )));
            }
            Ok(slots::list_open_slots(conn, &practitioner_id, &date, &grid)?)
        })
        .await?;

    Ok(Json(SlotsResponse {
        date: query.date,
        duration_minutes: grid.duration_minutes,
        slots,
    }))
}
