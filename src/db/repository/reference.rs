use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_date, parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, code, full_name, date_of_birth, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient.id.to_string(),
            patient.code,
            patient.full_name,
            patient.date_of_birth.as_ref().map(format_date),
            patient.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, code, full_name, date_of_birth, is_active FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i32>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, code, full_name, dob, is_active)| {
        Ok(Patient {
            id: parse_uuid("patients.id", &id)?,
            code,
            full_name,
            date_of_birth: dob.map(|d| parse_date("patients.date_of_birth", &d)).transpose()?,
            is_active: is_active != 0,
        })
    })
    .transpose()
}

pub fn insert_practitioner(conn: &Connection, prac: &Practitioner) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO practitioners (id, code, full_name, specialty, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            prac.id.to_string(),
            prac.code,
            prac.full_name,
            prac.specialty,
            prac.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_practitioner(conn: &Connection, id: &Uuid) -> Result<Option<Practitioner>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, code, full_name, specialty, is_active FROM practitioners WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i32>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, code, full_name, specialty, is_active)| {
        Ok(Practitioner {
            id: parse_uuid("practitioners.id", &id)?,
            code,
            full_name,
            specialty,
            is_active: is_active != 0,
        })
    })
    .transpose()
}

pub fn insert_visit(conn: &Connection, visit: &Visit) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO visits (id, code, patient_id, practitioner_id, visit_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            visit.id.to_string(),
            visit.code,
            visit.patient_id.to_string(),
            visit.practitioner_id.to_string(),
            format_date(&visit.visit_date),
        ],
    )?;
    Ok(())
}

pub fn get_visit(conn: &Connection, id: &Uuid) -> Result<Option<Visit>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, code, patient_id, practitioner_id, visit_date FROM visits WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, code, patient_id, practitioner_id, visit_date)| {
        Ok(Visit {
            id: parse_uuid("visits.id", &id)?,
            code,
            patient_id: parse_uuid("visits.patient_id", &patient_id)?,
            practitioner_id: parse_uuid("visits.practitioner_id", &practitioner_id)?,
            visit_date: parse_date("visits.visit_date", &visit_date)?,
        })
    })
    .transpose()
}

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, code, name, unit) VALUES (?1, ?2, ?3, ?4)",
        params![med.id.to_string(), med.code, med.name, med.unit],
    )?;
    Ok(())
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, code, name, unit FROM medications WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, code, name, unit)| {
        Ok(Medication {
            id: parse_uuid("medications.id", &id)?,
            code,
            name,
            unit,
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn patient_insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let id = fixtures::patient(&conn, "Ada Obi");
        let patient = get_patient(&conn, &id).unwrap().unwrap();
        assert_eq!(patient.full_name, "Ada Obi");
        assert!(patient.is_active);
        assert!(patient.date_of_birth.is_some());
    }

    #[test]
    fn missing_practitioner_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_practitioner(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn visit_requires_existing_patient() {
        let conn = open_memory_database().unwrap();
        let practitioner_id = fixtures::practitioner(&conn, "Dr. Park");
        let result = insert_visit(&conn, &Visit {
            id: Uuid::new_v4(),
            code: "VIS-1".into(),
            patient_id: Uuid::new_v4(),
            practitioner_id,
            visit_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn visit_round_trip() {
        let conn = open_memory_database().unwrap();
        let visit = fixtures::visit(&conn);
        let loaded = get_visit(&conn, &visit.id).unwrap().unwrap();
        assert_eq!(loaded.patient_id, visit.patient_id);
        assert_eq!(loaded.practitioner_id, visit.practitioner_id);
    }
}
