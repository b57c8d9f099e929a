use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AdmissionStatus;

/// Inpatient stay. `patient_id` and `practitioner_id` are read through the
/// owning visit and never written on the admission row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admission {
    pub id: Uuid,
    pub code: String,
    pub visit_id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub admission_date: NaiveDateTime,
    pub discharge_date: Option<NaiveDateTime>,
    pub admission_diagnosis: String,
    pub discharge_diagnosis: Option<String>,
    pub discharge_summary: Option<String>,
    pub status: AdmissionStatus,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NursingNote {
    pub id: Uuid,
    pub admission_id: Uuid,
    pub note: String,
    pub recorded_by: String,
    pub recorded_at: NaiveDateTime,
}
