//! Appointment scheduling and the appointment lifecycle.
//!
//! Every write runs inside one IMMEDIATE transaction together with the
//! availability check that guards it, so two bookings for the same slot
//! serialize on SQLite's writer lock and the second one sees the first.
//!
//! Lifecycle:
//! ```text
//! Scheduled ──confirm──▶ Confirmed
//!     │                     │
//!     └──────start──────────┴──▶ InProgress ──complete──▶ Completed
//! Scheduled | Confirmed | InProgress ──cancel──▶ Cancelled
//! Scheduled | Confirmed | InProgress ──no_show─▶ NoShow
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::db::repository::{self, APPOINTMENT_CODE_PREFIX};
use crate::db::{begin_immediate, DatabaseError};
use crate::models::enums::{AppointmentStatus, AppointmentType};
use crate::models::{Appointment, Cancellation};
use crate::slots;

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),
    #[error("Practitioner not found: {0}")]
    PractitionerNotFound(Uuid),
    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),
    #[error("Appointment time {0} is outside working hours (08:00-17:00)")]
    InvalidAppointmentTime(NaiveTime),
    #[error("Appointment date {0} is in the past")]
    PastAppointmentDate(NaiveDate),
    #[error("Duration of {0} minutes is not allowed (15, 30, 45 or 60)")]
    InvalidDuration(u32),
    #[error("Time slot is not available")]
    TimeSlotNotAvailable,
    #[error("Appointment is {0} and can no longer be changed")]
    TerminalState(AppointmentStatus),
    #[error("Cannot {event} an appointment that is {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        event: AppointmentEvent,
    },
    #[error("A cancellation reason is required")]
    MissingCancellationReason,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Request to book a new appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Fields to move. Anything left `None` keeps its current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

/// Lifecycle events that move an appointment between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEvent {
    Confirm,
    Start,
    Complete,
    NoShow,
    Cancel,
}

impl AppointmentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::NoShow => "mark as no-show",
            Self::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for AppointmentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. `None` means the event is illegal in `from`.
pub fn next_status(from: AppointmentStatus, event: AppointmentEvent) -> Option<AppointmentStatus> {
    use AppointmentEvent as E;
    use AppointmentStatus as S;

    match (from, event) {
        (S::Scheduled, E::Confirm) => Some(S::Confirmed),
        (S::Scheduled | S::Confirmed, E::Start) => Some(S::InProgress),
        (S::InProgress, E::Complete) => Some(S::Completed),
        (S::Scheduled | S::Confirmed | S::InProgress, E::NoShow) => Some(S::NoShow),
        (S::Scheduled | S::Confirmed | S::InProgress, E::Cancel) => Some(S::Cancelled),
        _ => None,
    }
}

// ─── Validation ───────────────────────────────────────────────────────────────

fn validate_time(time: NaiveTime) -> Result<(), SchedulingError> {
    if time < config::working_day_start() || time >= config::working_day_end() {
        return Err(SchedulingError::InvalidAppointmentTime(time));
    }
    Ok(())
}

fn validate_date(date: NaiveDate, today: NaiveDate) -> Result<(), SchedulingError> {
    if date < today {
        return Err(SchedulingError::PastAppointmentDate(date));
    }
    Ok(())
}

fn validate_duration(minutes: u32) -> Result<(), SchedulingError> {
    if !config::ALLOWED_APPOINTMENT_DURATIONS.contains(&minutes) {
        return Err(SchedulingError::InvalidDuration(minutes));
    }
    Ok(())
}

fn load(conn: &Connection, id: &Uuid) -> Result<Appointment, SchedulingError> {
    repository::get_appointment(conn, id)?
        .ok_or_else(|| SchedulingError::AppointmentNotFound(id.to_string()))
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Book an appointment in state Scheduled.
pub fn schedule(
    conn: &Connection,
    req: &ScheduleRequest,
    actor: &str,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let duration = req
        .duration_minutes
        .unwrap_or(config::DEFAULT_APPOINTMENT_DURATION_MINUTES);

    let tx = begin_immediate(conn)?;

    if repository::get_patient(&tx, &req.patient_id)?.is_none() {
        return Err(SchedulingError::PatientNotFound(req.patient_id));
    }
    if repository::get_practitioner(&tx, &req.practitioner_id)?.is_none() {
        return Err(SchedulingError::PractitionerNotFound(req.practitioner_id));
    }
    validate_time(req.time)?;
    validate_date(req.date, now.date())?;
    validate_duration(duration)?;

    if !slots::is_available(&tx, &req.practitioner_id, &req.date, &req.time, duration, None)? {
        tracing::warn!(
            practitioner_id = %req.practitioner_id,
            date = %req.date,
            time = %req.time,
            "Slot already taken"
        );
        return Err(SchedulingError::TimeSlotNotAvailable);
    }

    let appt = Appointment {
        id: Uuid::new_v4(),
        code: repository::generate_code(&tx, APPOINTMENT_CODE_PREFIX, now.date())?,
        patient_id: req.patient_id,
        practitioner_id: req.practitioner_id,
        date: req.date,
        time: req.time,
        duration_minutes: duration,
        appointment_type: req.appointment_type,
        status: AppointmentStatus::Scheduled,
        reason: req.reason.clone(),
        cancellation: None,
        created_at: now,
        updated_at: now,
        updated_by: Some(actor.to_string()),
    };
    repository::insert_appointment(&tx, &appt)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment_id = %appt.id, code = %appt.code, "Appointment scheduled");
    Ok(appt)
}

/// Move an appointment. Only the fields that change are re-validated, and
/// the merged slot must be free apart from the appointment itself.
pub fn reschedule(
    conn: &Connection,
    id: &Uuid,
    req: &RescheduleRequest,
    actor: &str,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = begin_immediate(conn)?;
    let mut appt = load(&tx, id)?;

    if appt.status.is_terminal() {
        return Err(SchedulingError::TerminalState(appt.status));
    }

    if let Some(date) = req.date {
        validate_date(date, now.date())?;
        appt.date = date;
    }
    if let Some(time) = req.time {
        validate_time(time)?;
        appt.time = time;
    }
    if let Some(minutes) = req.duration_minutes {
        validate_duration(minutes)?;
        appt.duration_minutes = minutes;
    }

    if !slots::is_available(
        &tx,
        &appt.practitioner_id,
        &appt.date,
        &appt.time,
        appt.duration_minutes,
        Some(&appt.id),
    )? {
        tracing::warn!(appointment_id = %appt.id, "Reschedule target slot already taken");
        return Err(SchedulingError::TimeSlotNotAvailable);
    }

    appt.updated_at = now;
    appt.updated_by = Some(actor.to_string());
    repository::update_appointment(&tx, &appt)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        appointment_id = %appt.id,
        date = %appt.date,
        time = %appt.time,
        "Appointment rescheduled"
    );
    Ok(appt)
}

/// Cancel with a mandatory reason; records who cancelled and when.
pub fn cancel(
    conn: &Connection,
    id: &Uuid,
    reason: &str,
    actor: &str,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(SchedulingError::MissingCancellationReason);
    }

    let tx = begin_immediate(conn)?;
    let mut appt = load(&tx, id)?;
    appt.status = transition(&appt, AppointmentEvent::Cancel)?;
    appt.cancellation = Some(Cancellation {
        reason: reason.to_string(),
        cancelled_at: now,
        cancelled_by: actor.to_string(),
    });
    appt.updated_at = now;
    appt.updated_by = Some(actor.to_string());
    repository::update_appointment(&tx, &appt)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(appointment_id = %appt.id, "Appointment cancelled");
    Ok(appt)
}

pub fn confirm(conn: &Connection, id: &Uuid, actor: &str, now: NaiveDateTime) -> Result<Appointment, SchedulingError> {
    apply_event(conn, id, AppointmentEvent::Confirm, actor, now)
}

pub fn start(conn: &Connection, id: &Uuid, actor: &str, now: NaiveDateTime) -> Result<Appointment, SchedulingError> {
    apply_event(conn, id, AppointmentEvent::Start, actor, now)
}

pub fn complete(conn: &Connection, id: &Uuid, actor: &str, now: NaiveDateTime) -> Result<Appointment, SchedulingError> {
    apply_event(conn, id, AppointmentEvent::Complete, actor, now)
}

pub fn mark_no_show(conn: &Connection, id: &Uuid, actor: &str, now: NaiveDateTime) -> Result<Appointment, SchedulingError> {
    apply_event(conn, id, AppointmentEvent::NoShow, actor, now)
}

fn transition(appt: &Appointment, event: AppointmentEvent) -> Result<AppointmentStatus, SchedulingError> {
    if appt.status.is_terminal() {
        return Err(SchedulingError::TerminalState(appt.status));
    }
    next_status(appt.status, event).ok_or(SchedulingError::InvalidTransition {
        from: appt.status,
        event,
    })
}

fn apply_event(
    conn: &Connection,
    id: &Uuid,
    event: AppointmentEvent,
    actor: &str,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = begin_immediate(conn)?;
    let mut appt = load(&tx, id)?;
    let from = appt.status;
    appt.status = transition(&appt, event)?;
    appt.updated_at = now;
    appt.updated_by = Some(actor.to_string());
    repository::update_appointment(&tx, &appt)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        appointment_id = %appt.id,
        from = %from,
        to = %appt.status,
        "Appointment status changed"
    );
    Ok(appt)
}

// ─── Queries ──────────────────────────────────────────────────────────────────

pub fn get(conn: &Connection, id: &Uuid) -> Result<Appointment, SchedulingError> {
    load(conn, id)
}

pub fn get_by_code(conn: &Connection, code: &str) -> Result<Appointment, SchedulingError> {
    repository::get_appointment_by_code(conn, code)?
        .ok_or_else(|| SchedulingError::AppointmentNotFound(code.to_string()))
}

/// A practitioner's appointments on one day, in start order.
pub fn list_for_practitioner(
    conn: &Connection,
    practitioner_id: &Uuid,
    date: &NaiveDate,
) -> Result<Vec<Appointment>, SchedulingError> {
    Ok(repository::list_appointments_for_practitioner(conn, practitioner_id, date)?)
}

/// A patient's appointments, most recent first.
pub fn list_for_patient(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Appointment>, SchedulingError> {
    Ok(repository::list_appointments_for_patient(conn, patient_id)?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
