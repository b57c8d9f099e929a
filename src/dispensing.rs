//! Pharmacy: prescriptions, inventory batches and the dispensing
//! transaction.
//!
//! `dispense` is all-or-nothing. Every line is validated and its stock
//! deducted inside one IMMEDIATE transaction; the first failing line rolls
//! back the records and deductions of the lines before it.
//!
//! Partial fills are allowed across calls, but the running total dispensed
//! against an item never exceeds its prescribed quantity.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{self, DISPENSING_CODE_PREFIX, PRESCRIPTION_CODE_PREFIX};
use crate::db::{begin_immediate, DatabaseError};
use crate::models::enums::PrescriptionStatus;
use crate::models::{Dispensing, InventoryBatch, Prescription, PrescriptionItem};

#[derive(Debug, thiserror::Error)]
pub enum DispenseError {
    #[error("Prescription not found: {0}")]
    PrescriptionNotFound(String),
    #[error("Prescription is {0} and cannot be dispensed")]
    PrescriptionNotDispensable(PrescriptionStatus),
    #[error("Prescription item {0} does not belong to this prescription")]
    PrescriptionItemNotFound(Uuid),
    #[error("Inventory batch not found: {0}")]
    InventoryNotFound(Uuid),
    #[error("Medication not found: {0}")]
    MedicationNotFound(Uuid),
    #[error("Visit not found: {0}")]
    VisitNotFound(Uuid),
    #[error("Practitioner not found: {0}")]
    PractitionerNotFound(Uuid),
    #[error("Batch {batch_number} holds a different medication than the prescription item")]
    MedicationMismatch { batch_number: String },
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },
    #[error("Batch {batch_number} expired on {expiry_date}")]
    ExpiredStock {
        batch_number: String,
        expiry_date: NaiveDate,
    },
    #[error("Prescribed {prescribed}, already dispensed {already_dispensed}, {requested} more requested")]
    QuantityExceedsPrescribed {
        prescribed: u32,
        already_dispensed: u64,
        requested: u32,
    },
    #[error("Batch {0} already exists for this medication")]
    DuplicateBatch(String),
    #[error("Request contains no lines")]
    EmptyRequest,
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,
    #[error("Prescription cannot move from {from} to {to}")]
    InvalidStatusChange {
        from: PrescriptionStatus,
        to: PrescriptionStatus,
    },
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ─── Request / response types ─────────────────────────────────────────────────

/// Hand out `quantity` from one batch against one prescription item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispenseLine {
    pub prescription_item_id: Uuid,
    pub inventory_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrescriptionItem {
    pub medication_id: Uuid,
    pub quantity: u32,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub visit_id: Uuid,
    /// Defaults to the visit's practitioner.
    #[serde(default)]
    pub prescriber_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewPrescriptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveBatchRequest {
    pub medication_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: u32,
    pub unit: String,
    /// Defaults to today.
    #[serde(default)]
    pub received_date: Option<NaiveDate>,
}

/// One step of a FIFO picking plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPick {
    pub inventory_id: Uuid,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: u32,
}

fn load_prescription(conn: &Connection, id: &Uuid) -> Result<Prescription, DispenseError> {
    repository::get_prescription(conn, id)?
        .ok_or_else(|| DispenseError::PrescriptionNotFound(id.to_string()))
}

// ─── Dispensing ───────────────────────────────────────────────────────────────

/// Dispense every line or nothing. On success a pending prescription moves
/// to Dispensed.
pub fn dispense(
    conn: &Connection,
    prescription_id: &Uuid,
    lines: &[DispenseLine],
    pharmacist_id: &str,
    now: NaiveDateTime,
) -> Result<Vec<Dispensing>, DispenseError> {
    let today = now.date();
    let tx = begin_immediate(conn)?;

    let rx = load_prescription(&tx, prescription_id)?;
    if matches!(rx.status, PrescriptionStatus::Cancelled | PrescriptionStatus::Completed) {
        return Err(DispenseError::PrescriptionNotDispensable(rx.status));
    }
    if lines.is_empty() {
        return Err(DispenseError::EmptyRequest);
    }

    let mut records = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(DispenseError::InvalidQuantity);
        }
        let item = rx
            .items
            .iter()
            .find(|i| i.id == line.prescription_item_id)
            .ok_or(DispenseError::PrescriptionItemNotFound(line.prescription_item_id))?;

        // Re-read per line: an earlier line may already have drawn on this batch.
        let batch = repository::get_batch(&tx, &line.inventory_id)?
            .ok_or(DispenseError::InventoryNotFound(line.inventory_id))?;
        check_batch(&batch, item, line.quantity, today)?;

        // Counts lines of this request already written in the transaction.
        let already_dispensed = repository::dispensed_quantity_for_item(&tx, &item.id)?;
        if already_dispensed + u64::from(line.quantity) > u64::from(item.quantity) {
            return Err(DispenseError::QuantityExceedsPrescribed {
                prescribed: item.quantity,
                already_dispensed,
                requested: line.quantity,
            });
        }

        let record = Dispensing {
            id: Uuid::new_v4(),
            code: repository::generate_code(&tx, DISPENSING_CODE_PREFIX, today)?,
            prescription_item_id: item.id,
            inventory_id: batch.id,
            medication_id: batch.medication_id,
            batch_number: batch.batch_number.clone(),
            quantity: line.quantity,
            patient_id: rx.patient_id,
            pharmacist_id: pharmacist_id.to_string(),
            dispensed_at: now,
        };
        repository::insert_dispensing(&tx, &record)?;
        if !repository::deduct_stock(&tx, &batch.id, line.quantity, &today)? {
            return Err(DispenseError::InsufficientStock {
                available: batch.quantity,
                requested: line.quantity,
            });
        }
        records.push(record);
    }

    if rx.status == PrescriptionStatus::Pending {
        repository::update_prescription_status(&tx, &rx.id, PrescriptionStatus::Dispensed)?;
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        prescription_id = %rx.id,
        lines = records.len(),
        pharmacist = pharmacist_id,
        "Prescription dispensed"
    );
    Ok(records)
}

fn check_batch(
    batch: &InventoryBatch,
    item: &PrescriptionItem,
    quantity: u32,
    today: NaiveDate,
) -> Result<(), DispenseError> {
    if batch.medication_id != item.medication_id {
        return Err(DispenseError::MedicationMismatch {
            batch_number: batch.batch_number.clone(),
        });
    }
    if batch.quantity < quantity {
        tracing::warn!(batch = %batch.batch_number, available = batch.quantity, requested = quantity, "Insufficient stock");
        return Err(DispenseError::InsufficientStock {
            available: batch.quantity,
            requested: quantity,
        });
    }
    if batch.is_expired(today) {
        tracing::warn!(batch = %batch.batch_number, expiry = %batch.expiry_date, "Expired stock requested");
        return Err(DispenseError::ExpiredStock {
            batch_number: batch.batch_number.clone(),
            expiry_date: batch.expiry_date,
        });
    }
    Ok(())
}

pub fn list_dispensings(conn: &Connection, prescription_id: &Uuid) -> Result<Vec<Dispensing>, DispenseError> {
    load_prescription(conn, prescription_id)?;
    Ok(repository::list_dispensings_for_prescription(conn, prescription_id)?)
}

// ─── Stock ────────────────────────────────────────────────────────────────────

pub fn receive_batch(
    conn: &Connection,
    req: &ReceiveBatchRequest,
    today: NaiveDate,
) -> Result<InventoryBatch, DispenseError> {
    if req.quantity == 0 {
        return Err(DispenseError::InvalidQuantity);
    }
    if repository::get_medication(conn, &req.medication_id)?.is_none() {
        return Err(DispenseError::MedicationNotFound(req.medication_id));
    }
    if req.expiry_date <= today {
        return Err(DispenseError::ExpiredStock {
            batch_number: req.batch_number.clone(),
            expiry_date: req.expiry_date,
        });
    }

    let batch = InventoryBatch {
        id: Uuid::new_v4(),
        medication_id: req.medication_id,
        batch_number: req.batch_number.trim().to_string(),
        expiry_date: req.expiry_date,
        quantity: req.quantity,
        unit: req.unit.clone(),
        received_date: req.received_date.unwrap_or(today),
    };
    repository::insert_batch(conn, &batch).map_err(|e| {
        if e.is_unique_violation() {
            DispenseError::DuplicateBatch(batch.batch_number.clone())
        } else {
            DispenseError::Database(e)
        }
    })?;

    tracing::info!(
        medication_id = %batch.medication_id,
        batch = %batch.batch_number,
        quantity = batch.quantity,
        "Stock received"
    );
    Ok(batch)
}

/// Usable batches (unexpired, non-empty) in FIFO order.
pub fn list_stock_fifo(
    conn: &Connection,
    medication_id: &Uuid,
    today: NaiveDate,
) -> Result<Vec<InventoryBatch>, DispenseError> {
    let batches = repository::list_batches_fifo(conn, medication_id)?;
    Ok(batches
        .into_iter()
        .filter(|b| b.quantity > 0 && !b.is_expired(today))
        .collect())
}

/// Plan which batches to draw `quantity` from, earliest expiry first.
/// Nothing is deducted; feed the plan into [`dispense`].
pub fn pick_fifo(
    conn: &Connection,
    medication_id: &Uuid,
    quantity: u32,
    today: NaiveDate,
) -> Result<Vec<StockPick>, DispenseError> {
    if quantity == 0 {
        return Err(DispenseError::InvalidQuantity);
    }
    let batches = list_stock_fifo(conn, medication_id, today)?;

    let mut remaining = quantity;
    let mut plan = Vec::new();
    for batch in &batches {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        plan.push(StockPick {
            inventory_id: batch.id,
            batch_number: batch.batch_number.clone(),
            expiry_date: batch.expiry_date,
            quantity: take,
        });
        remaining -= take;
    }

    if remaining > 0 {
        return Err(DispenseError::InsufficientStock {
            available: quantity - remaining,
            requested: quantity,
        });
    }
    Ok(plan)
}

// ─── Prescriptions ────────────────────────────────────────────────────────────

pub fn create_prescription(
    conn: &Connection,
    req: &CreatePrescriptionRequest,
    now: NaiveDateTime,
) -> Result<Prescription, DispenseError> {
    if req.items.is_empty() {
        return Err(DispenseError::EmptyRequest);
    }
    if req.items.iter().any(|i| i.quantity == 0) {
        return Err(DispenseError::InvalidQuantity);
    }

    let tx = begin_immediate(conn)?;
    let visit = repository::get_visit(&tx, &req.visit_id)?
        .ok_or(DispenseError::VisitNotFound(req.visit_id))?;
    let prescriber_id = req.prescriber_id.unwrap_or(visit.practitioner_id);
    if repository::get_practitioner(&tx, &prescriber_id)?.is_none() {
        return Err(DispenseError::PractitionerNotFound(prescriber_id));
    }
    for item in &req.items {
        if repository::get_medication(&tx, &item.medication_id)?.is_none() {
            return Err(DispenseError::MedicationNotFound(item.medication_id));
        }
    }

    let id = Uuid::new_v4();
    let rx = Prescription {
        id,
        code: repository::generate_code(&tx, PRESCRIPTION_CODE_PREFIX, now.date())?,
        visit_id: visit.id,
        patient_id: visit.patient_id,
        prescriber_id,
        status: PrescriptionStatus::Pending,
        notes: req.notes.clone(),
        created_at: now,
        items: req
            .items
            .iter()
            .map(|i| PrescriptionItem {
                id: Uuid::new_v4(),
                prescription_id: id,
                medication_id: i.medication_id,
                quantity: i.quantity,
                dosage: i.dosage.clone(),
                frequency: i.frequency.clone(),
                duration: i.duration.clone(),
                instructions: i.instructions.clone(),
            })
            .collect(),
    };
    repository::insert_prescription(&tx, &rx)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(prescription_id = %rx.id, code = %rx.code, items = rx.items.len(), "Prescription created");
    Ok(rx)
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Prescription, DispenseError> {
    load_prescription(conn, id)
}

/// Dispensed → Completed.
pub fn complete_prescription(conn: &Connection, id: &Uuid) -> Result<Prescription, DispenseError> {
    change_status(conn, id, PrescriptionStatus::Dispensed, PrescriptionStatus::Completed)
}

/// Pending → Cancelled. Once anything was dispensed the prescription stays.
pub fn cancel_prescription(conn: &Connection, id: &Uuid) -> Result<Prescription, DispenseError> {
    change_status(conn, id, PrescriptionStatus::Pending, PrescriptionStatus::Cancelled)
}

fn change_status(
    conn: &Connection,
    id: &Uuid,
    expected: PrescriptionStatus,
    to: PrescriptionStatus,
) -> Result<Prescription, DispenseError> {
    let tx = begin_immediate(conn)?;
    let mut rx = load_prescription(&tx, id)?;
    if rx.status != expected {
        return Err(DispenseError::InvalidStatusChange { from: rx.status, to });
    }
    repository::update_prescription_status(&tx, id, to)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(prescription_id = %id, from = %rx.status, to = %to, "Prescription status changed");
    rx.status = to;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> NaiveDateTime {
        date(2024, 6, 1).and_hms_opt(11, 30, 0).unwrap()
    }

    fn stock(conn: &Connection, batch: &Uuid) -> u32 {
        repository::get_batch(conn, batch).unwrap().unwrap().quantity
    }

    fn dispensing_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM dispensings", [], |row| row.get(0))
            .unwrap()
    }

    fn line(item: &PrescriptionItem, batch: Uuid, quantity: u32) -> DispenseLine {
        DispenseLine {
            prescription_item_id: item.id,
            inventory_id: batch,
            quantity,
        }
    }

    #[test]
    fn dispense_deducts_and_records() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 10)]);
        let batch = fixtures::batch(&conn, med, "AMX-01", 50, date(2025, 1, 1), date(2024, 1, 1));

        let records = dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 10)], "pharm-1", now()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "DSP-20240601-0001");
        assert_eq!(records[0].batch_number, "AMX-01");
        assert_eq!(records[0].patient_id, rx.patient_id);
        assert_eq!(stock(&conn, &batch), 40);
        assert_eq!(get_prescription(&conn, &rx.id).unwrap().status, PrescriptionStatus::Dispensed);
        assert_eq!(list_dispensings(&conn, &rx.id).unwrap().len(), 1);
    }

    #[test]
    fn failing_middle_line_rolls_back_everything() {
        let conn = open_memory_database().unwrap();
        let a = fixtures::medication(&conn, "Amoxicillin");
        let b = fixtures::medication(&conn, "Ibuprofen");
        let c = fixtures::medication(&conn, "Paracetamol");
        let rx = fixtures::prescription(&conn, &[(a, 5), (b, 20), (c, 5)]);
        let ba = fixtures::batch(&conn, a, "A1", 10, date(2025, 1, 1), date(2024, 1, 1));
        let bb = fixtures::batch(&conn, b, "B1", 3, date(2025, 1, 1), date(2024, 1, 1));
        let bc = fixtures::batch(&conn, c, "C1", 10, date(2025, 1, 1), date(2024, 1, 1));

        let result = dispense(
            &conn,
            &rx.id,
            &[
                line(&rx.items[0], ba, 5),
                line(&rx.items[1], bb, 20),
                line(&rx.items[2], bc, 5),
            ],
            "pharm-1",
            now(),
        );

        assert!(matches!(
            result,
            Err(DispenseError::InsufficientStock { available: 3, requested: 20 })
        ));
        assert_eq!(stock(&conn, &ba), 10);
        assert_eq!(stock(&conn, &bb), 3);
        assert_eq!(stock(&conn, &bc), 10);
        assert_eq!(dispensing_count(&conn), 0);
        assert_eq!(get_prescription(&conn, &rx.id).unwrap().status, PrescriptionStatus::Pending);
    }

    #[test]
    fn expired_batch_untouched() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 5)]);
        let batch = fixtures::batch(&conn, med, "OLD", 5, date(2024, 5, 31), date(2023, 6, 1));

        let result = dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 5)], "pharm-1", now());
        assert!(matches!(result, Err(DispenseError::ExpiredStock { .. })));
        assert_eq!(stock(&conn, &batch), 5);
        assert_eq!(dispensing_count(&conn), 0);
    }

    #[test]
    fn batch_expiring_today_is_expired() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 5)]);
        let batch = fixtures::batch(&conn, med, "EDGE", 5, now().date(), date(2023, 6, 1));

        assert!(matches!(
            dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 1)], "pharm-1", now()),
            Err(DispenseError::ExpiredStock { .. })
        ));
    }

    #[test]
    fn two_lines_draw_on_same_batch() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 6), (med, 6)]);
        let batch = fixtures::batch(&conn, med, "B1", 10, date(2025, 1, 1), date(2024, 1, 1));

        let result = dispense(
            &conn,
            &rx.id,
            &[line(&rx.items[0], batch, 6), line(&rx.items[1], batch, 6)],
            "pharm-1",
            now(),
        );
        assert!(matches!(
            result,
            Err(DispenseError::InsufficientStock { available: 4, requested: 6 })
        ));
        assert_eq!(stock(&conn, &batch), 10);
    }

    #[test]
    fn request_validation() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let other = fixtures::medication(&conn, "Metformin");
        let rx = fixtures::prescription(&conn, &[(med, 5)]);
        let batch = fixtures::batch(&conn, med, "B1", 10, date(2025, 1, 1), date(2024, 1, 1));
        let wrong = fixtures::batch(&conn, other, "M1", 10, date(2025, 1, 1), date(2024, 1, 1));

        assert!(matches!(
            dispense(&conn, &Uuid::new_v4(), &[line(&rx.items[0], batch, 1)], "p", now()),
            Err(DispenseError::PrescriptionNotFound(_))
        ));
        assert!(matches!(
            dispense(&conn, &rx.id, &[], "p", now()),
            Err(DispenseError::EmptyRequest)
        ));
        assert!(matches!(
            dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 0)], "p", now()),
            Err(DispenseError::InvalidQuantity)
        ));
        let stray = DispenseLine { prescription_item_id: Uuid::new_v4(), inventory_id: batch, quantity: 1 };
        assert!(matches!(
            dispense(&conn, &rx.id, &[stray], "p", now()),
            Err(DispenseError::PrescriptionItemNotFound(_))
        ));
        assert!(matches!(
            dispense(&conn, &rx.id, &[line(&rx.items[0], Uuid::new_v4(), 1)], "p", now()),
            Err(DispenseError::InventoryNotFound(_))
        ));
        assert!(matches!(
            dispense(&conn, &rx.id, &[line(&rx.items[0], wrong, 1)], "p", now()),
            Err(DispenseError::MedicationMismatch { .. })
        ));
    }

    #[test]
    fn partial_fills_stop_at_prescribed_quantity() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 10)]);
        let batch = fixtures::batch(&conn, med, "B1", 50, date(2025, 1, 1), date(2024, 1, 1));

        dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 6)], "p", now()).unwrap();
        assert!(matches!(
            dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 6)], "p", now()),
            Err(DispenseError::QuantityExceedsPrescribed {
                prescribed: 10,
                already_dispensed: 6,
                requested: 6
            })
        ));
        assert_eq!(stock(&conn, &batch), 44);
        assert_eq!(dispensing_count(&conn), 1);

        dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 4)], "p", now()).unwrap();
        assert_eq!(stock(&conn, &batch), 40);
    }

    #[test]
    fn lines_for_one_item_count_together() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 10)]);
        let first = fixtures::batch(&conn, med, "B1", 50, date(2025, 1, 1), date(2024, 1, 1));
        let second = fixtures::batch(&conn, med, "B2", 50, date(2025, 2, 1), date(2024, 1, 1));

        let result = dispense(
            &conn,
            &rx.id,
            &[line(&rx.items[0], first, 6), line(&rx.items[0], second, 6)],
            "p",
            now(),
        );
        assert!(matches!(result, Err(DispenseError::QuantityExceedsPrescribed { .. })));
        assert_eq!(stock(&conn, &first), 50);
        assert_eq!(dispensing_count(&conn), 0);
    }

    #[test]
    fn cancelled_prescription_not_dispensable() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 5)]);
        let batch = fixtures::batch(&conn, med, "B1", 10, date(2025, 1, 1), date(2024, 1, 1));
        cancel_prescription(&conn, &rx.id).unwrap();

        assert!(matches!(
            dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 1)], "p", now()),
            Err(DispenseError::PrescriptionNotDispensable(PrescriptionStatus::Cancelled))
        ));
    }

    #[test]
    fn prescription_status_flow() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 5)]);
        let batch = fixtures::batch(&conn, med, "B1", 10, date(2025, 1, 1), date(2024, 1, 1));

        assert!(matches!(
            complete_prescription(&conn, &rx.id),
            Err(DispenseError::InvalidStatusChange { .. })
        ));
        dispense(&conn, &rx.id, &[line(&rx.items[0], batch, 5)], "p", now()).unwrap();
        assert!(matches!(
            cancel_prescription(&conn, &rx.id),
            Err(DispenseError::InvalidStatusChange { .. })
        ));
        let done = complete_prescription(&conn, &rx.id).unwrap();
        assert_eq!(done.status, PrescriptionStatus::Completed);
    }

    #[test]
    fn create_prescription_from_visit() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let visit = fixtures::visit(&conn);

        let req = CreatePrescriptionRequest {
            visit_id: visit.id,
            prescriber_id: None,
            notes: Some("Review in a week".into()),
            items: vec![NewPrescriptionItem {
                medication_id: med,
                quantity: 14,
                dosage: "500 mg".into(),
                frequency: "twice daily".into(),
                duration: "7 days".into(),
                instructions: None,
            }],
        };
        let rx = create_prescription(&conn, &req, now()).unwrap();
        assert_eq!(rx.code, "RX-20240601-0001");
        assert_eq!(rx.prescriber_id, visit.practitioner_id);
        assert_eq!(rx.patient_id, visit.patient_id);
        assert_eq!(get_prescription(&conn, &rx.id).unwrap().items.len(), 1);

        let mut bad = req.clone();
        bad.items[0].medication_id = Uuid::new_v4();
        assert!(matches!(
            create_prescription(&conn, &bad, now()),
            Err(DispenseError::MedicationNotFound(_))
        ));

        let mut empty = req;
        empty.items.clear();
        assert!(matches!(create_prescription(&conn, &empty, now()), Err(DispenseError::EmptyRequest)));
    }

    #[test]
    fn receive_batch_rules() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let today = date(2024, 6, 1);
        let req = ReceiveBatchRequest {
            medication_id: med,
            batch_number: "AMX-77".into(),
            expiry_date: date(2025, 6, 1),
            quantity: 100,
            unit: "capsule".into(),
            received_date: None,
        };

        let batch = receive_batch(&conn, &req, today).unwrap();
        assert_eq!(batch.received_date, today);
        assert!(matches!(receive_batch(&conn, &req, today), Err(DispenseError::DuplicateBatch(_))));

        let expired = ReceiveBatchRequest { batch_number: "AMX-78".into(), expiry_date: today, ..req.clone() };
        assert!(matches!(receive_batch(&conn, &expired, today), Err(DispenseError::ExpiredStock { .. })));

        let unknown = ReceiveBatchRequest { medication_id: Uuid::new_v4(), batch_number: "X".into(), ..req };
        assert!(matches!(receive_batch(&conn, &unknown, today), Err(DispenseError::MedicationNotFound(_))));
    }

    #[test]
    fn fifo_stock_and_picking() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let today = date(2024, 6, 1);
        fixtures::batch(&conn, med, "EXPIRED", 100, date(2024, 5, 1), date(2023, 1, 1));
        fixtures::batch(&conn, med, "EMPTY", 0, date(2024, 7, 1), date(2024, 1, 1));
        fixtures::batch(&conn, med, "SOON", 8, date(2024, 8, 1), date(2024, 2, 1));
        fixtures::batch(&conn, med, "LATER", 50, date(2025, 8, 1), date(2024, 1, 1));

        let usable = list_stock_fifo(&conn, &med, today).unwrap();
        let names: Vec<_> = usable.iter().map(|b| b.batch_number.as_str()).collect();
        assert_eq!(names, vec!["SOON", "LATER"]);

        let plan = pick_fifo(&conn, &med, 20, today).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].batch_number.as_str(), plan[0].quantity), ("SOON", 8));
        assert_eq!((plan[1].batch_number.as_str(), plan[1].quantity), ("LATER", 12));

        assert!(matches!(
            pick_fifo(&conn, &med, 100, today),
            Err(DispenseError::InsufficientStock { available: 58, requested: 100 })
        ));
    }

    #[test]
    fn fifo_plan_dispenses_across_batches() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 12)]);
        let soon = fixtures::batch(&conn, med, "SOON", 8, date(2024, 8, 1), date(2024, 2, 1));
        let later = fixtures::batch(&conn, med, "LATER", 50, date(2025, 8, 1), date(2024, 1, 1));

        let plan = pick_fifo(&conn, &med, 12, now().date()).unwrap();
        let lines: Vec<_> = plan.iter().map(|p| line(&rx.items[0], p.inventory_id, p.quantity)).collect();
        let records = dispense(&conn, &rx.id, &lines, "pharm-1", now()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(stock(&conn, &soon), 0);
        assert_eq!(stock(&conn, &later), 46);
    }
}
