use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

// Patient and practitioner come from the visit; admissions never store them.
const ADMISSION_SELECT: &str =
    "SELECT a.id, a.code, a.visit_id, v.patient_id, v.practitioner_id, a.admission_date,
            a.discharge_date, a.admission_diagnosis, a.discharge_diagnosis, a.discharge_summary,
            a.status, a.created_by
     FROM admissions a
     JOIN visits v ON v.id = a.visit_id";

/// Insert an admission row. `patient_id`/`practitioner_id` on the model are
/// derived from the visit and are not written.
pub fn insert_admission(conn: &Connection, adm: &Admission) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO admissions (id, code, visit_id, admission_date, discharge_date,
         admission_diagnosis, discharge_diagnosis, discharge_summary, status, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            adm.id.to_string(),
            adm.code,
            adm.visit_id.to_string(),
            format_timestamp(&adm.admission_date),
            adm.discharge_date.as_ref().map(format_timestamp),
            adm.admission_diagnosis,
            adm.discharge_diagnosis,
            adm.discharge_summary,
            adm.status.as_str(),
            adm.created_by,
        ],
    )?;
    Ok(())
}

/// Persist the closing fields of an admission (discharge or transfer out).
pub fn update_admission_outcome(conn: &Connection, adm: &Admission) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE admissions SET discharge_date = ?2, discharge_diagnosis = ?3,
         discharge_summary = ?4, status = ?5
         WHERE id = ?1",
        params![
            adm.id.to_string(),
            adm.discharge_date.as_ref().map(format_timestamp),
            adm.discharge_diagnosis,
            adm.discharge_summary,
            adm.status.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Admission".into(),
            id: adm.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_admission(conn: &Connection, id: &Uuid) -> Result<Option<Admission>, DatabaseError> {
    let sql = format!("{ADMISSION_SELECT} WHERE a.id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], admission_row_from_rusqlite)
        .optional()?;
    row.map(admission_from_row).transpose()
}

pub fn get_admission_by_code(conn: &Connection, code: &str) -> Result<Option<Admission>, DatabaseError> {
    let sql = format!("{ADMISSION_SELECT} WHERE a.code = ?1");
    let row = conn
        .query_row(&sql, params![code], admission_row_from_rusqlite)
        .optional()?;
    row.map(admission_from_row).transpose()
}

pub fn list_admissions_by_status(
    conn: &Connection,
    status: AdmissionStatus,
) -> Result<Vec<Admission>, DatabaseError> {
    let sql = format!("{ADMISSION_SELECT} WHERE a.status = ?1 ORDER BY a.admission_date DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status.as_str()], admission_row_from_rusqlite)?;

    let mut admissions = Vec::new();
    for row in rows {
        admissions.push(admission_from_row(row?)?);
    }
    Ok(admissions)
}

pub fn insert_nursing_note(conn: &Connection, note: &NursingNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO nursing_notes (id, admission_id, note, recorded_by, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            note.id.to_string(),
            note.admission_id.to_string(),
            note.note,
            note.recorded_by,
            format_timestamp(&note.recorded_at),
        ],
    )?;
    Ok(())
}

pub fn list_nursing_notes(
    conn: &Connection,
    admission_id: &Uuid,
) -> Result<Vec<NursingNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, admission_id, note, recorded_by, recorded_at
         FROM nursing_notes WHERE admission_id = ?1
         ORDER BY recorded_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![admission_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut notes = Vec::new();
    for row in rows {
        let (id, admission_id, note, recorded_by, recorded_at) = row?;
        notes.push(NursingNote {
            id: parse_uuid("nursing_notes.id", &id)?,
            admission_id: parse_uuid("nursing_notes.admission_id", &admission_id)?,
            note,
            recorded_by,
            recorded_at: parse_timestamp("nursing_notes.recorded_at", &recorded_at)?,
        });
    }
    Ok(notes)
}

struct AdmissionRow {
    id: String,
    code: String,
    visit_id: String,
    patient_id: String,
    practitioner_id: String,
    admission_date: String,
    discharge_date: Option<String>,
    admission_diagnosis: String,
    discharge_diagnosis: Option<String>,
    discharge_summary: Option<String>,
    status: String,
    created_by: String,
}

fn admission_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AdmissionRow, rusqlite::Error> {
    Ok(AdmissionRow {
        id: row.get(0)?,
        code: row.get(1)?,
        visit_id: row.get(2)?,
        patient_id: row.get(3)?,
        practitioner_id: row.get(4)?,
        admission_date: row.get(5)?,
        discharge_date: row.get(6)?,
        admission_diagnosis: row.get(7)?,
        discharge_diagnosis: row.get(8)?,
        discharge_summary: row.get(9)?,
        status: row.get(10)?,
        created_by: row.get(11)?,
    })
}

fn admission_from_row(row: AdmissionRow) -> Result<Admission, DatabaseError> {
    Ok(Admission {
        id: parse_uuid("admissions.id", &row.id)?,
        code: row.code,
        visit_id: parse_uuid("admissions.visit_id", &row.visit_id)?,
        patient_id: parse_uuid("visits.patient_id", &row.patient_id)?,
        practitioner_id: parse_uuid("visits.practitioner_id", &row.practitioner_id)?,
        admission_date: parse_timestamp("admissions.admission_date", &row.admission_date)?,
        discharge_date: row
            .discharge_date
            .map(|d| parse_timestamp("admissions.discharge_date", &d))
            .transpose()?,
        admission_diagnosis: row.admission_diagnosis,
        discharge_diagnosis: row.discharge_diagnosis,
        discharge_summary: row.discharge_summary,
        status: AdmissionStatus::from_str(&row.status)?,
        created_by: row.created_by,
    })
}
