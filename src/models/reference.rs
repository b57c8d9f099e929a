//! Reference records owned by other parts of the HIS. This crate only
//! reads them (plus inserts for seeding and tests).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub code: String,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: Uuid,
    pub code: String,
    pub full_name: String,
    pub specialty: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub code: String,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub visit_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
}
