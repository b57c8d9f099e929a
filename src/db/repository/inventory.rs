use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_date, parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const BATCH_COLUMNS: &str =
    "id, medication_id, batch_number, expiry_date, quantity, unit, received_date";

pub fn insert_batch(conn: &Connection, batch: &InventoryBatch) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO inventory (id, medication_id, batch_number, expiry_date, quantity,
         unit, received_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            batch.id.to_string(),
            batch.medication_id.to_string(),
            batch.batch_number,
            format_date(&batch.expiry_date),
            batch.quantity,
            batch.unit,
            format_date(&batch.received_date),
        ],
    )?;
    Ok(())
}

pub fn get_batch(conn: &Connection, id: &Uuid) -> Result<Option<InventoryBatch>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {BATCH_COLUMNS} FROM inventory WHERE id = ?1"),
            params![id.to_string()],
            batch_row_from_rusqlite,
        )
        .optional()?;
    row.map(batch_from_row).transpose()
}

/// Batches of a medication in FIFO order: earliest expiry first, then
/// earliest received. Expired and empty batches are included.
pub fn list_batches_fifo(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Vec<InventoryBatch>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BATCH_COLUMNS} FROM inventory
         WHERE medication_id = ?1
         ORDER BY expiry_date ASC, received_date ASC, batch_number ASC"
    ))?;
    let rows = stmt.query_map(params![medication_id.to_string()], batch_row_from_rusqlite)?;

    let mut batches = Vec::new();
    for row in rows {
        batches.push(batch_from_row(row?)?);
    }
    Ok(batches)
}

/// Subtract `quantity` from a batch if it still holds that much and has not
/// expired as of `today`. Returns false when the guard rejected the write.
pub fn deduct_stock(
    conn: &Connection,
    batch_id: &Uuid,
    quantity: u32,
    today: &NaiveDate,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE inventory SET quantity = quantity - ?2
         WHERE id = ?1 AND quantity >= ?2 AND expiry_date > ?3",
        params![batch_id.to_string(), quantity, format_date(today)],
    )?;
    Ok(changed == 1)
}

struct BatchRow {
    id: String,
    medication_id: String,
    batch_number: String,
    expiry_date: String,
    quantity: i64,
    unit: String,
    received_date: String,
}

fn batch_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<BatchRow, rusqlite::Error> {
    Ok(BatchRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        batch_number: row.get(2)?,
        expiry_date: row.get(3)?,
        quantity: row.get(4)?,
        unit: row.get(5)?,
        received_date: row.get(6)?,
    })
}

fn batch_from_row(row: BatchRow) -> Result<InventoryBatch, DatabaseError> {
    Ok(InventoryBatch {
        id: parse_uuid("inventory.id", &row.id)?,
        medication_id: parse_uuid("inventory.medication_id", &row.medication_id)?,
        batch_number: row.batch_number,
        expiry_date: parse_date("inventory.expiry_date", &row.expiry_date)?,
        quantity: u32::try_from(row.quantity).map_err(|_| DatabaseError::InvalidValue {
            field: "inventory.quantity".into(),
            value: row.quantity.to_string(),
        })?,
        unit: row.unit,
        received_date: parse_date("inventory.received_date", &row.received_date)?,
    })
}
