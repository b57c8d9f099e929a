use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

/// Insert a prescription and all of its items.
pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, code, visit_id, prescriber_id, status, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            rx.id.to_string(),
            rx.code,
            rx.visit_id.to_string(),
            rx.prescriber_id.to_string(),
            rx.status.as_str(),
            rx.notes,
            format_timestamp(&rx.created_at),
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO prescription_items (id, prescription_id, medication_id, quantity,
         dosage, frequency, duration, instructions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for item in &rx.items {
        stmt.execute(params![
            item.id.to_string(),
            rx.id.to_string(),
            item.medication_id.to_string(),
            item.quantity,
            item.dosage,
            item.frequency,
            item.duration,
            item.instructions,
        ])?;
    }
    Ok(())
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT p.id, p.code, p.visit_id, v.patient_id, p.prescriber_id, p.status,
                    p.notes, p.created_at
             FROM prescriptions p
             JOIN visits v ON v.id = p.visit_id
             WHERE p.id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((id, code, visit_id, patient_id, prescriber_id, status, notes, created_at)) = row
    else {
        return Ok(None);
    };

    let id = parse_uuid("prescriptions.id", &id)?;
    Ok(Some(Prescription {
        id,
        code,
        visit_id: parse_uuid("prescriptions.visit_id", &visit_id)?,
        patient_id: parse_uuid("visits.patient_id", &patient_id)?,
        prescriber_id: parse_uuid("prescriptions.prescriber_id", &prescriber_id)?,
        status: PrescriptionStatus::from_str(&status)?,
        notes,
        created_at: parse_timestamp("prescriptions.created_at", &created_at)?,
        items: list_prescription_items(conn, &id)?,
    }))
}

pub fn list_prescription_items(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<PrescriptionItem>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM prescription_items
         WHERE prescription_id = ?1 ORDER BY rowid ASC"
    ))?;
    let rows = stmt.query_map(params![prescription_id.to_string()], item_row_from_rusqlite)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(item_from_row(row?)?);
    }
    Ok(items)
}

pub fn get_prescription_item(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<PrescriptionItem>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM prescription_items WHERE id = ?1"),
            params![id.to_string()],
            item_row_from_rusqlite,
        )
        .optional()?;
    row.map(item_from_row).transpose()
}

pub fn update_prescription_status(
    conn: &Connection,
    id: &Uuid,
    status: PrescriptionStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Prescription".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

const ITEM_COLUMNS: &str =
    "id, prescription_id, medication_id, quantity, dosage, frequency, duration, instructions";

struct ItemRow {
    id: String,
    prescription_id: String,
    medication_id: String,
    quantity: i64,
    dosage: String,
    frequency: String,
    duration: String,
    instructions: Option<String>,
}

fn item_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ItemRow, rusqlite::Error> {
    Ok(ItemRow {
        id: row.get(0)?,
        prescription_id: row.get(1)?,
        medication_id: row.get(2)?,
        quantity: row.get(3)?,
        dosage: row.get(4)?,
        frequency: row.get(5)?,
        duration: row.get(6)?,
        instructions: row.get(7)?,
    })
}

fn item_from_row(row: ItemRow) -> Result<PrescriptionItem, DatabaseError> {
    Ok(PrescriptionItem {
        id: parse_uuid("prescription_items.id", &row.id)?,
        prescription_id: parse_uuid("prescription_items.prescription_id", &row.prescription_id)?,
        medication_id: parse_uuid("prescription_items.medication_id", &row.medication_id)?,
        quantity: u32::try_from(row.quantity).map_err(|_| DatabaseError::InvalidValue {
            field: "prescription_items.quantity".into(),
            value: row.quantity.to_string(),
        })?,
        dosage: row.dosage,
        frequency: row.frequency,
        duration: row.duration,
        instructions: row.instructions,
    })
}
