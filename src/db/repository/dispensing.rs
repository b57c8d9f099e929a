use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

/// Append a dispensing record. Rows are never updated afterwards.
pub fn insert_dispensing(conn: &Connection, d: &Dispensing) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dispensings (id, code, prescription_item_id, inventory_id, medication_id,
         batch_number, quantity, pharmacist_id, dispensed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            d.id.to_string(),
            d.code,
            d.prescription_item_id.to_string(),
            d.inventory_id.to_string(),
            d.medication_id.to_string(),
            d.batch_number,
            d.quantity,
            d.pharmacist_id,
            format_timestamp(&d.dispensed_at),
        ],
    )?;
    Ok(())
}

/// All dispensings against any item of a prescription, oldest first.
pub fn list_dispensings_for_prescription(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<Dispensing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.code, d.prescription_item_id, d.inventory_id, d.medication_id,
                d.batch_number, d.quantity, v.patient_id, d.pharmacist_id, d.dispensed_at
         FROM dispensings d
         JOIN prescription_items i ON i.id = d.prescription_item_id
         JOIN prescriptions p ON p.id = i.prescription_id
         JOIN visits v ON v.id = p.visit_id
         WHERE p.id = ?1
         ORDER BY d.dispensed_at ASC, d.rowid ASC",
    )?;
    let rows = stmt.query_map(params![prescription_id.to_string()], |row| {
        Ok(DispensingRow {
            id: row.get(0)?,
            code: row.get(1)?,
            prescription_item_id: row.get(2)?,
            inventory_id: row.get(3)?,
            medication_id: row.get(4)?,
            batch_number: row.get(5)?,
            quantity: row.get(6)?,
            patient_id: row.get(7)?,
            pharmacist_id: row.get(8)?,
            dispensed_at: row.get(9)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(dispensing_from_row(row?)?);
    }
    Ok(records)
}

/// Total quantity already dispensed against one prescription item.
pub fn dispensed_quantity_for_item(conn: &Connection, item_id: &Uuid) -> Result<u64, DatabaseError> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0) FROM dispensings WHERE prescription_item_id = ?1",
        params![item_id.to_string()],
        |row| row.get(0),
    )?;
    u64::try_from(total).map_err(|_| DatabaseError::InvalidValue {
        field: "dispensings.quantity".into(),
        value: total.to_string(),
    })
}

struct DispensingRow {
    id: String,
    code: String,
    prescription_item_id: String,
    inventory_id: String,
    medication_id: String,
    batch_number: String,
    quantity: i64,
    patient_id: String,
    pharmacist_id: String,
    dispensed_at: String,
}

fn dispensing_from_row(row: DispensingRow) -> Result<Dispensing, DatabaseError> {
    Ok(Dispensing {
        id: parse_uuid("dispensings.id", &row.id)?,
        code: row.code,
        prescription_item_id: parse_uuid("dispensings.prescription_item_id", &row.prescription_item_id)?,
        inventory_id: parse_uuid("dispensings.inventory_id", &row.inventory_id)?,
        medication_id: parse_uuid("dispensings.medication_id", &row.medication_id)?,
        batch_number: row.batch_number,
        quantity: u32::try_from(row.quantity).map_err(|_| DatabaseError::InvalidValue {
            field: "dispensings.quantity".into(),
            value: row.quantity.to_string(),
        })?,
        patient_id: parse_uuid("visits.patient_id", &row.patient_id)?,
        pharmacist_id: row.pharmacist_id,
        dispensed_at: parse_timestamp("dispensings.dispensed_at", &row.dispensed_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use chrono::NaiveDate;

    fn record(rx_item: Uuid, batch: Uuid, medication_id: Uuid, patient_id: Uuid) -> Dispensing {
        Dispensing {
            id: Uuid::new_v4(),
            code: format!("DSP-{}", &Uuid::new_v4().simple().to_string()[..8]),
            prescription_item_id: rx_item,
            inventory_id: batch,
            medication_id,
            batch_number: "B1".into(),
            quantity: 3,
            patient_id,
            pharmacist_id: "pharm-1".into(),
            dispensed_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn dispensing_lists_with_patient_from_visit() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 3)]);
        let batch = fixtures::batch(
            &conn,
            med,
            "B1",
            10,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        insert_dispensing(&conn, &record(rx.items[0].id, batch, med, Uuid::new_v4())).unwrap();

        insert_dispensing(&conn, &record(rx.items[0].id, batch, med, Uuid::new_v4())).unwrap();
        assert_eq!(dispensed_quantity_for_item(&conn, &rx.items[0].id).unwrap(), 6);
        assert_eq!(dispensed_quantity_for_item(&conn, &Uuid::new_v4()).unwrap(), 0);

        let records = list_dispensings_for_prescription(&conn, &rx.id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].patient_id, rx.patient_id);
        assert_eq!(records[0].batch_number, "B1");
    }

    #[test]
    fn dispensing_rows_are_immutable() {
        let conn = open_memory_database().unwrap();
        let med = fixtures::medication(&conn, "Amoxicillin");
        let rx = fixtures::prescription(&conn, &[(med, 3)]);
        let batch = fixtures::batch(
            &conn,
            med,
            "B1",
            10,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let d = record(rx.items[0].id, batch, med, rx.patient_id);
        insert_dispensing(&conn, &d).unwrap();

        let result = conn.execute(
            "UPDATE dispensings SET quantity = 99 WHERE id = ?1",
            params![d.id.to_string()],
        );
        assert!(result.is_err());
    }
}
