use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PrescriptionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub code: String,
    pub visit_id: Uuid,
    pub patient_id: Uuid,
    pub prescriber_id: Uuid,
    pub status: PrescriptionStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub items: Vec<PrescriptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub medication_id: Uuid,
    pub quantity: u32,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
}

/// A received batch of one medication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryBatch {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: u32,
    pub unit: String,
    pub received_date: NaiveDate,
}

impl InventoryBatch {
    /// A batch expiring today is already unusable.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date <= today
    }
}

/// Immutable record of stock handed out against a prescription item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispensing {
    pub id: Uuid,
    pub code: String,
    pub prescription_item_id: Uuid,
    pub inventory_id: Uuid,
    pub medication_id: Uuid,
    pub batch_number: String,
    pub quantity: u32,
    pub patient_id: Uuid,
    pub pharmacist_id: String,
    pub dispensed_at: NaiveDateTime,
}
