use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BedStatus, BedType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bed {
    pub id: Uuid,
    pub bed_number: String,
    pub department: String,
    pub ward: String,
    pub bed_type: BedType,
    pub status: BedStatus,
    pub is_active: bool,
}

/// One admission occupying one bed for `[allocated_date, released_date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedAllocation {
    pub id: Uuid,
    pub admission_id: Uuid,
    pub bed_id: Uuid,
    pub allocated_date: NaiveDateTime,
    pub released_date: Option<NaiveDateTime>,
    pub is_current: bool,
    pub notes: Option<String>,
    pub allocated_by: String,
}
