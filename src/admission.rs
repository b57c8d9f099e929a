//! Inpatient admission lifecycle: admit, move between beds, discharge or
//! transfer out, plus nursing notes.
//!
//! ```text
//! Admitted ──discharge────▶ Discharged
//!     │
//!     └──────transfer_out─▶ Transferred
//! ```
//! Each operation is one IMMEDIATE transaction; bed moves go through
//! `bed_allocation` on that same transaction.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bed_allocation::{self, BedError};
use crate::db::repository::{self, ADMISSION_CODE_PREFIX};
use crate::db::{begin_immediate, DatabaseError};
use crate::models::enums::AdmissionStatus;
use crate::models::{Admission, BedAllocation, NursingNote};

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Visit not found: {0}")]
    VisitNotFound(Uuid),
    #[error("Admission not found: {0}")]
    AdmissionNotFound(String),
    #[error("Admission is {0}, not admitted")]
    AdmissionNotActive(AdmissionStatus),
    #[error("Patient is already in that bed")]
    SameBed,
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error(transparent)]
    Bed(#[from] BedError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdmissionRequest {
    pub visit_id: Uuid,
    pub admission_diagnosis: String,
    #[serde(default)]
    pub bed_id: Option<Uuid>,
    #[serde(default)]
    pub bed_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeRequest {
    pub discharge_diagnosis: String,
    #[serde(default)]
    pub discharge_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferBedRequest {
    pub bed_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Inter-facility transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutRequest {
    pub destination: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// An admission together with the bed it currently holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionDetail {
    #[serde(flatten)]
    pub admission: Admission,
    pub current_allocation: Option<BedAllocation>,
}

fn load(conn: &Connection, id: &Uuid) -> Result<Admission, AdmissionError> {
    repository::get_admission(conn, id)?
        .ok_or_else(|| AdmissionError::AdmissionNotFound(id.to_string()))
}

fn load_active(conn: &Connection, id: &Uuid) -> Result<Admission, AdmissionError> {
    let adm = load(conn, id)?;
    if adm.status != AdmissionStatus::Admitted {
        return Err(AdmissionError::AdmissionNotActive(adm.status));
    }
    Ok(adm)
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, AdmissionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdmissionError::MissingField(field));
    }
    Ok(trimmed)
}

/// Release whatever bed the admission holds and put it back in the pool.
fn vacate_bed(conn: &Connection, admission_id: &Uuid, now: NaiveDateTime) -> Result<Option<BedAllocation>, AdmissionError> {
    let Some(current) = repository::find_current_allocation(conn, admission_id)? else {
        return Ok(None);
    };
    let released = bed_allocation::release_within(conn, &current.id, now)?;
    bed_allocation::set_bed_available_within(conn, &released.bed_id)?;
    Ok(Some(released))
}

// ── Operations ──────────────────────────────────────────────

/// Admit the patient of `visit_id`, optionally straight into a bed. A bed
/// failure rolls the admission back too.
pub fn create_admission(
    conn: &Connection,
    req: &CreateAdmissionRequest,
    actor: &str,
    now: NaiveDateTime,
) -> Result<AdmissionDetail, AdmissionError> {
    let diagnosis = required("admission_diagnosis", &req.admission_diagnosis)?;

    let tx = begin_immediate(conn)?;
    let visit = repository::get_visit(&tx, &req.visit_id)?
        .ok_or(AdmissionError::VisitNotFound(req.visit_id))?;

    let admission = Admission {
        id: Uuid::new_v4(),
        code: repository::generate_code(&tx, ADMISSION_CODE_PREFIX, now.date())?,
        visit_id: visit.id,
        patient_id: visit.patient_id,
        practitioner_id: visit.practitioner_id,
        admission_date: now,
        discharge_date: None,
        admission_diagnosis: diagnosis.to_string(),
        discharge_diagnosis: None,
        discharge_summary: None,
        status: AdmissionStatus::Admitted,
        created_by: actor.to_string(),
    };
    repository::insert_admission(&tx, &admission)?;

    let current_allocation = match &req.bed_id {
        Some(bed_id) => Some(bed_allocation::allocate_within(
            &tx,
            &admission.id,
            bed_id,
            req.bed_notes.as_deref(),
            actor,
            now,
        )?),
        None => None,
    };
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        admission_id = %admission.id,
        code = %admission.code,
        with_bed = current_allocation.is_some(),
        "Patient admitted"
    );
    Ok(AdmissionDetail {
        admission,
        current_allocation,
    })
}

/// Discharge: free the bed, stamp the discharge date, record the outcome.
pub fn discharge(
    conn: &Connection,
    admission_id: &Uuid,
    req: &DischargeRequest,
    now: NaiveDateTime,
) -> Result<Admission, AdmissionError> {
    let diagnosis = required("discharge_diagnosis", &req.discharge_diagnosis)?;

    let tx = begin_immediate(conn)?;
    let mut adm = load_active(&tx, admission_id)?;
    vacate_bed(&tx, admission_id, now)?;

    adm.discharge_date = Some(now);
    adm.discharge_diagnosis = Some(diagnosis.to_string());
    adm.discharge_summary = req.discharge_summary.clone();
    adm.status = AdmissionStatus::Discharged;
    repository::update_admission_outcome(&tx, &adm)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(admission_id = %adm.id, "Patient discharged");
    Ok(adm)
}

/// Move an admitted patient to another bed. The old bed becomes Available.
pub fn transfer_bed(
    conn: &Connection,
    admission_id: &Uuid,
    req: &TransferBedRequest,
    actor: &str,
    now: NaiveDateTime,
) -> Result<BedAllocation, AdmissionError> {
    let tx = begin_immediate(conn)?;
    load_active(&tx, admission_id)?;

    if let Some(current) = repository::find_current_allocation(&tx, admission_id)? {
        if current.bed_id == req.bed_id {
            return Err(AdmissionError::SameBed);
        }
    }
    let old = vacate_bed(&tx, admission_id, now)?;
    let alloc = bed_allocation::allocate_within(
        &tx,
        admission_id,
        &req.bed_id,
        req.notes.as_deref(),
        actor,
        now,
    )?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        admission_id = %admission_id,
        from_bed = ?old.map(|a| a.bed_id),
        to_bed = %alloc.bed_id,
        "Patient moved to another bed"
    );
    Ok(alloc)
}

/// Hand the patient over to another facility.
pub fn transfer_out(
    conn: &Connection,
    admission_id: &Uuid,
    req: &TransferOutRequest,
    now: NaiveDateTime,
) -> Result<Admission, AdmissionError> {
    let destination = required("destination", &req.destination)?;

    let tx = begin_immediate(conn)?;
    let mut adm = load_active(&tx, admission_id)?;
    vacate_bed(&tx, admission_id, now)?;

    let mut summary = format!("Transferred to {destination}");
    if let Some(extra) = req.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        summary.push_str(". ");
        summary.push_str(extra);
    }
    adm.discharge_date = Some(now);
    adm.discharge_summary = Some(summary);
    adm.status = AdmissionStatus::Transferred;
    repository::update_admission_outcome(&tx, &adm)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(admission_id = %adm.id, destination, "Patient transferred out");
    Ok(adm)
}

pub fn add_nursing_note(
    conn: &Connection,
    admission_id: &Uuid,
    note: &str,
    actor: &str,
    now: NaiveDateTime,
) -> Result<NursingNote, AdmissionError> {
    let text = required("note", note)?;
    load_active(conn, admission_id)?;

    let note = NursingNote {
        id: Uuid::new_v4(),
        admission_id: *admission_id,
        note: text.to_string(),
        recorded_by: actor.to_string(),
        recorded_at: now,
    };
    repository::insert_nursing_note(conn, &note)?;
    Ok(note)
}

pub fn list_nursing_notes(conn: &Connection, admission_id: &Uuid) -> Result<Vec<NursingNote>, AdmissionError> {
    load(conn, admission_id)?;
    Ok(repository::list_nursing_notes(conn, admission_id)?)
}

// ── Queries ─────────────────────────────────────────────────

pub fn get(conn: &Connection, id: &Uuid) -> Result<AdmissionDetail, AdmissionError> {
    let admission = load(conn, id)?;
    let current_allocation = repository::find_current_allocation(conn, id)?;
    Ok(AdmissionDetail {
        admission,
        current_allocation,
    })
}

pub fn get_by_code(conn: &Connection, code: &str) -> Result<Admission, AdmissionError> {
    repository::get_admission_by_code(conn, code)?
        .ok_or_else(|| AdmissionError::AdmissionNotFound(code.to_string()))
}

pub fn list_active(conn: &Connection) -> Result<Vec<Admission>, AdmissionError> {
    Ok(repository::list_admissions_by_status(conn, AdmissionStatus::Admitted)?)
}
