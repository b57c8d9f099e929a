//! Time-slot availability for practitioner calendars.
//!
//! Intervals are half-open `[start, start + duration)` in minutes from
//! midnight, so an appointment ending at 09:30 never conflicts with one
//! starting at 09:30. Cancelled and no-show appointments free their slot.

use chrono::{NaiveDate, NaiveTime, Timelike};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::db::repository;
use crate::db::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Slot granularity of {0} minutes must be between 1 and the length of the working day")]
    InvalidGranularity(u32),
    #[error("Working hours {start}..{end} are empty")]
    EmptyWorkingHours { start: NaiveTime, end: NaiveTime },
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// One grid position in a practitioner's day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSlot {
    pub time: NaiveTime,
    pub available: bool,
}

/// Shape of the slot grid used by [`list_open_slots`].
#[derive(Debug, Clone, Copy)]
pub struct SlotGrid {
    pub granularity_minutes: u32,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub duration_minutes: u32,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            granularity_minutes: config::DEFAULT_SLOT_GRANULARITY_MINUTES,
            day_start: config::working_day_start(),
            day_end: config::working_day_end(),
            duration_minutes: config::DEFAULT_APPOINTMENT_DURATION_MINUTES,
        }
    }
}

fn minute_of_day(time: &NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

/// Half-open interval overlap: `a.start < b.end && b.start < a.end`.
/// Zero-length intervals never overlap anything.
pub fn overlaps(a_start: u32, a_len: u32, b_start: u32, b_len: u32) -> bool {
    a_start < b_start + b_len && b_start < a_start + a_len && a_len > 0 && b_len > 0
}

/// Whether `practitioner_id` is free on `date` for `[start, start+duration)`.
///
/// `exclude` skips one appointment, so a reschedule does not collide with
/// its own current booking.
pub fn is_available(
    conn: &Connection,
    practitioner_id: &Uuid,
    date: &NaiveDate,
    start: &NaiveTime,
    duration_minutes: u32,
    exclude: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let booked = repository::list_slot_holding_appointments(conn, practitioner_id, date, exclude)?;
    let proposed = minute_of_day(start);
    let clash = booked.iter().any(|appt| {
        overlaps(
            minute_of_day(&appt.time),
            appt.duration_minutes,
            proposed,
            duration_minutes,
        )
    });
    Ok(!clash)
}

/// Every grid start within working hours, each marked free or taken.
pub fn list_open_slots(
    conn: &Connection,
    practitioner_id: &Uuid,
    date: &NaiveDate,
    grid: &SlotGrid,
) -> Result<Vec<OpenSlot>, SlotError> {
    if grid.day_start >= grid.day_end {
        return Err(SlotError::EmptyWorkingHours {
            start: grid.day_start,
            end: grid.day_end,
        });
    }
    let start = minute_of_day(&grid.day_start);
    let end = minute_of_day(&grid.day_end);
    if grid.granularity_minutes == 0 || grid.granularity_minutes > end - start {
        return Err(SlotError::InvalidGranularity(grid.granularity_minutes));
    }

    let booked = repository::list_slot_holding_appointments(conn, practitioner_id, date, None)?;
    let intervals: Vec<(u32, u32)> = booked
        .iter()
        .map(|a| (minute_of_day(&a.time), a.duration_minutes))
        .collect();

    let mut slots = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let available = !intervals
            .iter()
            .any(|&(s, len)| overlaps(s, len, cursor, grid.duration_minutes));
        if let Some(time) = NaiveTime::from_hms_opt(cursor / 60, cursor % 60, 0) {
            slots.push(OpenSlot { time, available });
        }
        cursor = match cursor.checked_add(grid.granularity_minutes) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{AppointmentStatus, AppointmentType};
    use crate::models::Appointment;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn book(conn: &Connection, practitioner: Uuid, time: NaiveTime, minutes: u32, status: AppointmentStatus) -> Uuid {
        let patient = fixtures::patient(conn, "Ada Obi");
        let id = Uuid::new_v4();
        let stamp = day().and_hms_opt(7, 0, 0).unwrap();
        repository::insert_appointment(conn, &Appointment {
            id,
            code: format!("APT-{}", &id.simple().to_string()[..8]),
            patient_id: patient,
            practitioner_id: practitioner,
            date: day(),
            time,
            duration_minutes: minutes,
            appointment_type: AppointmentType::Consultation,
            status,
            reason: None,
            cancellation: None,
            created_at: stamp,
            updated_at: stamp,
            updated_by: None,
        })
        .unwrap();
        id
    }

    #[test]
    fn overlap_rules() {
        // 09:00-09:30 vs 09:15-09:45
        assert!(overlaps(540, 30, 555, 30));
        // touching at 09:30
        assert!(!overlaps(540, 30, 570, 30));
        // containment
        assert!(overlaps(540, 60, 555, 15));
        // zero length
        assert!(!overlaps(540, 30, 550, 0));
    }

    #[test]
    fn conflicting_start_rejected_touching_start_accepted() {
        let conn = open_memory_database().unwrap();
        let dr = fixtures::practitioner(&conn, "Dr. Park");
        book(&conn, dr, t(9, 0), 30, AppointmentStatus::Scheduled);

        assert!(!is_available(&conn, &dr, &day(), &t(9, 15), 30, None).unwrap());
        assert!(is_available(&conn, &dr, &day(), &t(9, 30), 30, None).unwrap());
        assert!(is_available(&conn, &dr, &day(), &t(8, 30), 30, None).unwrap());
    }

    #[test]
    fn cancelled_and_no_show_do_not_block() {
        let conn = open_memory_database().unwrap();
        let dr = fixtures::practitioner(&conn, "Dr. Park");
        book(&conn, dr, t(10, 0), 60, AppointmentStatus::Cancelled);
        book(&conn, dr, t(11, 0), 60, AppointmentStatus::NoShow);

        assert!(is_available(&conn, &dr, &day(), &t(10, 0), 60, None).unwrap());
        assert!(is_available(&conn, &dr, &day(), &t(11, 0), 60, None).unwrap());
    }

    #[test]
    fn excluded_appointment_ignored() {
        let conn = open_memory_database().unwrap();
        let dr = fixtures::practitioner(&conn, "Dr. Park");
        let own = book(&conn, dr, t(9, 0), 30, AppointmentStatus::Confirmed);

        assert!(!is_available(&conn, &dr, &day(), &t(9, 0), 45, None).unwrap());
        assert!(is_available(&conn, &dr, &day(), &t(9, 0), 45, Some(&own)).unwrap());
    }

    #[test]
    fn other_practitioner_unaffected() {
        let conn = open_memory_database().unwrap();
        let dr = fixtures::practitioner(&conn, "Dr. Park");
        let other = fixtures::practitioner(&conn, "Dr. Mensah");
        book(&conn, dr, t(9, 0), 30, AppointmentStatus::Scheduled);
        assert!(is_available(&conn, &other, &day(), &t(9, 0), 30, None).unwrap());
    }

    #[test]
    fn open_slots_cover_working_day() {
        let conn = open_memory_database().unwrap();
        let dr = fixtures::practitioner(&conn, "Dr. Park");
        book(&conn, dr, t(9, 0), 45, AppointmentStatus::Scheduled);

        let slots = list_open_slots(&conn, &dr, &day(), &SlotGrid::default()).unwrap();
        assert_eq!(slots.len(), 18);
        assert_eq!(slots[0].time, t(8, 0));
        assert_eq!(slots[17].time, t(16, 30));

        let taken: Vec<_> = slots.iter().filter(|s| !s.available).map(|s| s.time).collect();
        assert_eq!(taken, vec![t(9, 0), t(9, 30)]);
    }

    #[test]
    fn granularity_of_whole_day_gives_one_slot() {
        let conn = open_memory_database().unwrap();
        let dr = fixtures::practitioner(&conn, "Dr. Park");
        let grid = SlotGrid { granularity_minutes: 9 * 60, ..SlotGrid::default() };

        let slots = list_open_slots(&conn, &dr, &day(), &grid).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].time, t(8, 0));
    }

    #[test]
    fn degenerate_grid_rejected() {
        let conn = open_memory_database().unwrap();
        let dr = fixtures::practitioner(&conn, "Dr. Park");

        let zero = SlotGrid { granularity_minutes: 0, ..SlotGrid::default() };
        assert!(matches!(
            list_open_slots(&conn, &dr, &day(), &zero),
            Err(SlotError::InvalidGranularity(0))
        ));

        let huge = SlotGrid { granularity_minutes: 4_294_967_000, ..SlotGrid::default() };
        assert!(matches!(
            list_open_slots(&conn, &dr, &day(), &huge),
            Err(SlotError::InvalidGranularity(4_294_967_000))
        ));

        let empty = SlotGrid { day_start: t(17, 0), day_end: t(8, 0), ..SlotGrid::default() };
        assert!(matches!(
            list_open_slots(&conn, &dr, &day(), &empty),
            Err(SlotError::EmptyWorkingHours { .. })
        ));
    }
}
