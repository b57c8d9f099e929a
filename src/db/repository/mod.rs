//! Repository layer: entity-scoped database operations.
//!
//! Functions take a `&Connection` so callers can pass either a plain
//! connection or an open `Transaction` (which derefs to one).

mod admission;
mod appointment;
mod bed;
mod code;
mod dispensing;
mod inventory;
mod prescription;
mod reference;
mod staff;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use super::{DatabaseError, DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};

pub use admission::*;
pub use appointment::*;
pub use bed::*;
pub use code::*;
pub use dispensing::*;
pub use inventory::*;
pub use prescription::*;
pub use reference::*;
pub use staff::*;

// ── Column conversion helpers ───────────────────────────────

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_time(field: &str, value: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| invalid(field, value))
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn invalid(field: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Seed helpers shared by the repository and service tests.

    use chrono::NaiveDate;
    use rusqlite::Connection;
    use uuid::Uuid;

    use super::*;
    use crate::models::*;

    pub fn patient(conn: &Connection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_patient(conn, &Patient {
            id,
            code: format!("PAT-{}", &id.simple().to_string()[..8]),
            full_name: name.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 17),
            is_active: true,
        })
        .unwrap();
        id
    }

    pub fn practitioner(conn: &Connection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_practitioner(conn, &Practitioner {
            id,
            code: format!("DR-{}", &id.simple().to_string()[..8]),
            full_name: name.into(),
            specialty: Some("Internal Medicine".into()),
            is_active: true,
        })
        .unwrap();
        id
    }

    /// Patient + practitioner + visit. Returns the visit.
    pub fn visit(conn: &Connection) -> Visit {
        let patient_id = patient(conn, "Ada Obi");
        let practitioner_id = practitioner(conn, "Dr. Lena Park");
        let visit = Visit {
            id: Uuid::new_v4(),
            code: format!("VIS-{}", &Uuid::new_v4().simple().to_string()[..8]),
            patient_id,
            practitioner_id,
            visit_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        insert_visit(conn, &visit).unwrap();
        visit
    }

    pub fn medication(conn: &Connection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_medication(conn, &Medication {
            id,
            code: format!("MED-{}", &id.simple().to_string()[..8]),
            name: name.into(),
            unit: "tablet".into(),
        })
        .unwrap();
        id
    }

    pub fn bed(conn: &Connection, number: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_bed(conn, &Bed {
            id,
            bed_number: number.into(),
            department: "Internal Medicine".into(),
            ward: "Ward A".into(),
            bed_type: crate::models::enums::BedType::Standard,
            status: crate::models::enums::BedStatus::Available,
            is_active: true,
        })
        .unwrap();
        id
    }

    /// Admitted admission (no bed) on a fresh visit. Returns its id.
    pub fn admission(conn: &Connection, actor: &str) -> Uuid {
        let visit = visit(conn);
        let id = Uuid::new_v4();
        insert_admission(conn, &Admission {
            id,
            code: format!("ADM-{}", &id.simple().to_string()[..8]),
            visit_id: visit.id,
            patient_id: visit.patient_id,
            practitioner_id: visit.practitioner_id,
            admission_date: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            discharge_date: None,
            admission_diagnosis: "Community-acquired pneumonia".into(),
            discharge_diagnosis: None,
            discharge_summary: None,
            status: crate::models::enums::AdmissionStatus::Admitted,
            created_by: actor.into(),
        })
        .unwrap();
        id
    }

    /// Pending prescription on a fresh visit with one item per `(medication, quantity)`.
    pub fn prescription(conn: &Connection, lines: &[(Uuid, u32)]) -> Prescription {
        let visit = visit(conn);
        let id = Uuid::new_v4();
        let rx = Prescription {
            id,
            code: format!("RX-{}", &id.simple().to_string()[..8]),
            visit_id: visit.id,
            patient_id: visit.patient_id,
            prescriber_id: visit.practitioner_id,
            status: crate::models::enums::PrescriptionStatus::Pending,
            notes: None,
            created_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            items: lines
                .iter()
                .map(|(medication_id, quantity)| PrescriptionItem {
                    id: Uuid::new_v4(),
                    prescription_id: id,
                    medication_id: *medication_id,
                    quantity: *quantity,
                    dosage: "500 mg".into(),
                    frequency: "twice daily".into(),
                    duration: "5 days".into(),
                    instructions: Some("After meals".into()),
                })
                .collect(),
        };
        insert_prescription(conn, &rx).unwrap();
        rx
    }

    pub fn batch(
        conn: &Connection,
        medication_id: Uuid,
        batch_number: &str,
        quantity: u32,
        expiry: NaiveDate,
        received: NaiveDate,
    ) -> Uuid {
        let id = Uuid::new_v4();
        insert_batch(conn, &InventoryBatch {
            id,
            medication_id,
            batch_number: batch_number.into(),
            expiry_date: expiry,
            quantity,
            unit: "tablet".into(),
            received_date: received,
        })
        .unwrap();
        id
    }
}
