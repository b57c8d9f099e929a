use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    format_date, format_time, format_timestamp, parse_date, parse_time, parse_timestamp,
    parse_uuid,
};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str =
    "id, code, patient_id, practitioner_id, appointment_date, start_time, duration_minutes,
     appointment_type, status, reason, cancellation_reason, cancelled_at, cancelled_by,
     created_at, updated_at, updated_by";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let (cancellation_reason, cancelled_at, cancelled_by) = cancellation_columns(appt);
    conn.execute(
        "INSERT INTO appointments (id, code, patient_id, practitioner_id, appointment_date,
         start_time, duration_minutes, appointment_type, status, reason, cancellation_reason,
         cancelled_at, cancelled_by, created_at, updated_at, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            appt.id.to_string(),
            appt.code,
            appt.patient_id.to_string(),
            appt.practitioner_id.to_string(),
            format_date(&appt.date),
            format_time(&appt.time),
            appt.duration_minutes,
            appt.appointment_type.as_str(),
            appt.status.as_str(),
            appt.reason,
            cancellation_reason,
            cancelled_at,
            cancelled_by,
            format_timestamp(&appt.created_at),
            format_timestamp(&appt.updated_at),
            appt.updated_by,
        ],
    )?;
    Ok(())
}

/// Full-record update of every mutable column.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let (cancellation_reason, cancelled_at, cancelled_by) = cancellation_columns(appt);
    let changed = conn.execute(
        "UPDATE appointments SET appointment_date = ?2, start_time = ?3, duration_minutes = ?4,
         appointment_type = ?5, status = ?6, reason = ?7, cancellation_reason = ?8,
         cancelled_at = ?9, cancelled_by = ?10, updated_at = ?11, updated_by = ?12
         WHERE id = ?1",
        params![
            appt.id.to_string(),
            format_date(&appt.date),
            format_time(&appt.time),
            appt.duration_minutes,
            appt.appointment_type.as_str(),
            appt.status.as_str(),
            appt.reason,
            cancellation_reason,
            cancelled_at,
            cancelled_by,
            format_timestamp(&appt.updated_at),
            appt.updated_by,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: appt.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], appointment_row_from_rusqlite)
        .optional()?;
    row.map(appointment_from_row).transpose()
}

pub fn get_appointment_by_code(
    conn: &Connection,
    code: &str,
) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE code = ?1");
    let row = conn
        .query_row(&sql, params![code], appointment_row_from_rusqlite)
        .optional()?;
    row.map(appointment_from_row).transpose()
}

/// Every appointment of a practitioner on one day, ordered by start time.
pub fn list_appointments_for_practitioner(
    conn: &Connection,
    practitioner_id: &Uuid,
    date: &NaiveDate,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practitioner_id = ?1 AND appointment_date = ?2
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![practitioner_id.to_string(), format_date(date)],
        appointment_row_from_rusqlite,
    )?;

    let mut appts = Vec::new();
    for row in rows {
        appts.push(appointment_from_row(row?)?);
    }
    Ok(appts)
}

/// Appointments that still hold their slot (not cancelled, not no-show),
/// optionally skipping one appointment being rescheduled.
pub fn list_slot_holding_appointments(
    conn: &Connection,
    practitioner_id: &Uuid,
    date: &NaiveDate,
    exclude_id: Option<&Uuid>,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practitioner_id = ?1 AND appointment_date = ?2
           AND status NOT IN ('cancelled', 'no_show')
           AND (?3 IS NULL OR id != ?3)
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            practitioner_id.to_string(),
            format_date(date),
            exclude_id.map(|id| id.to_string()),
        ],
        appointment_row_from_rusqlite,
    )?;

    let mut appts = Vec::new();
    for row in rows {
        appts.push(appointment_from_row(row?)?);
    }
    Ok(appts)
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE patient_id = ?1
         ORDER BY appointment_date DESC, start_time DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id.to_string()], appointment_row_from_rusqlite)?;

    let mut appts = Vec::new();
    for row in rows {
        appts.push(appointment_from_row(row?)?);
    }
    Ok(appts)
}

fn cancellation_columns(appt: &Appointment) -> (Option<String>, Option<String>, Option<String>) {
    match &appt.cancellation {
        Some(c) => (
            Some(c.reason.clone()),
            Some(format_timestamp(&c.cancelled_at)),
            Some(c.cancelled_by.clone()),
        ),
        None => (None, None, None),
    }
}

struct AppointmentRow {
    id: String,
    code: String,
    patient_id: String,
    practitioner_id: String,
    appointment_date: String,
    start_time: String,
    duration_minutes: u32,
    appointment_type: String,
    status: String,
    reason: Option<String>,
    cancellation_reason: Option<String>,
    cancelled_at: Option<String>,
    cancelled_by: Option<String>,
    created_at: String,
    updated_at: String,
    updated_by: Option<String>,
}

fn appointment_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AppointmentRow, rusqlite::Error> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        code: row.get(1)?,
        patient_id: row.get(2)?,
        practitioner_id: row.get(3)?,
        appointment_date: row.get(4)?,
        start_time: row.get(5)?,
        duration_minutes: row.get(6)?,
        appointment_type: row.get(7)?,
        status: row.get(8)?,
        reason: row.get(9)?,
        cancellation_reason: row.get(10)?,
        cancelled_at: row.get(11)?,
        cancelled_by: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        updated_by: row.get(15)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    let cancellation = match (row.cancellation_reason, row.cancelled_at, row.cancelled_by) {
        (Some(reason), Some(at), Some(by)) => Some(Cancellation {
            reason,
            cancelled_at: parse_timestamp("appointments.cancelled_at", &at)?,
            cancelled_by: by,
        }),
        _ => None,
    };

    Ok(Appointment {
        id: parse_uuid("appointments.id", &row.id)?,
        code: row.code,
        patient_id: parse_uuid("appointments.patient_id", &row.patient_id)?,
        practitioner_id: parse_uuid("appointments.practitioner_id", &row.practitioner_id)?,
        date: parse_date("appointments.appointment_date", &row.appointment_date)?,
        time: parse_time("appointments.start_time", &row.start_time)?,
        duration_minutes: row.duration_minutes,
        appointment_type: AppointmentType::from_str(&row.appointment_type)?,
        status: AppointmentStatus::from_str(&row.status)?,
        reason: row.reason,
        cancellation,
        created_at: parse_timestamp("appointments.created_at", &row.created_at)?,
        updated_at: parse_timestamp("appointments.updated_at", &row.updated_at)?,
        updated_by: row.updated_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use chrono::{NaiveDateTime, NaiveTime};

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn make(
        conn: &Connection,
        practitioner_id: Uuid,
        hour: u32,
        minute: u32,
        status: AppointmentStatus,
    ) -> Appointment {
        let patient_id = fixtures::patient(conn, "Ada Obi");
        let appt = Appointment {
            id: Uuid::new_v4(),
            code: format!("APT-20240601-{:04}", hour * 100 + minute),
            patient_id,
            practitioner_id,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            duration_minutes: 30,
            appointment_type: AppointmentType::Consultation,
            status,
            reason: Some("Persistent cough".into()),
            cancellation: None,
            created_at: ts(),
            updated_at: ts(),
            updated_by: None,
        };
        insert_appointment(conn, &appt).unwrap();
        appt
    }

    #[test]
    fn appointment_insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let prac = fixtures::practitioner(&conn, "Dr. Park");
        let appt = make(&conn, prac, 9, 0, AppointmentStatus::Scheduled);

        let loaded = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded.code, appt.code);
        assert_eq!(loaded.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(loaded.status, AppointmentStatus::Scheduled);
        assert!(loaded.cancellation.is_none());

        let by_code = get_appointment_by_code(&conn, &appt.code).unwrap().unwrap();
        assert_eq!(by_code.id, appt.id);
    }

    #[test]
    fn duplicate_code_rejected() {
        let conn = open_memory_database().unwrap();
        let prac = fixtures::practitioner(&conn, "Dr. Park");
        let appt = make(&conn, prac, 9, 0, AppointmentStatus::Scheduled);
        let mut dup = appt.clone();
        dup.id = Uuid::new_v4();
        let err = insert_appointment(&conn, &dup).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn slot_holding_excludes_cancelled_no_show_and_self() {
        let conn = open_memory_database().unwrap();
        let prac = fixtures::practitioner(&conn, "Dr. Park");
        let kept = make(&conn, prac, 9, 0, AppointmentStatus::Confirmed);
        let moving = make(&conn, prac, 10, 0, AppointmentStatus::Scheduled);
        make(&conn, prac, 11, 0, AppointmentStatus::Cancelled);
        make(&conn, prac, 12, 0, AppointmentStatus::NoShow);

        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let all = list_slot_holding_appointments(&conn, &prac, &date, None).unwrap();
        assert_eq!(all.len(), 2);

        let without = list_slot_holding_appointments(&conn, &prac, &date, Some(&moving.id)).unwrap();
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].id, kept.id);
    }

    #[test]
    fn practitioner_day_listing_is_ordered() {
        let conn = open_memory_database().unwrap();
        let prac = fixtures::practitioner(&conn, "Dr. Park");
        make(&conn, prac, 14, 0, AppointmentStatus::Scheduled);
        make(&conn, prac, 8, 30, AppointmentStatus::Scheduled);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let list = list_appointments_for_practitioner(&conn, &prac, &date).unwrap();
        assert_eq!(list[0].time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(list[1].time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
    }

    #[test]
    fn update_persists_cancellation() {
        let conn = open_memory_database().unwrap();
        let prac = fixtures::practitioner(&conn, "Dr. Park");
        let mut appt = make(&conn, prac, 9, 0, AppointmentStatus::Scheduled);
        appt.status = AppointmentStatus::Cancelled;
        appt.cancellation = Some(Cancellation {
            reason: "Patient request".into(),
            cancelled_at: ts(),
            cancelled_by: "staff-1".into(),
        });
        update_appointment(&conn, &appt).unwrap();

        let loaded = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded.status, AppointmentStatus::Cancelled);
        assert_eq!(loaded.cancellation.unwrap().cancelled_by, "staff-1");
    }

    #[test]
    fn update_missing_appointment_is_not_found() {
        let conn = open_memory_database().unwrap();
        let prac = fixtures::practitioner(&conn, "Dr. Park");
        let mut appt = make(&conn, prac, 9, 0, AppointmentStatus::Scheduled);
        appt.id = Uuid::new_v4();
        let err = update_appointment(&conn, &appt).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
