//! Bed allocation manager: the only code that moves a bed into or out of
//! Occupied.
//!
//! The `*_within` variants run on a caller's open transaction so the
//! admission lifecycle can compose release + allocate atomically. The plain
//! variants open their own IMMEDIATE transaction.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{self, BedFilter};
use crate::db::{begin_immediate, DatabaseError};
use crate::models::enums::{BedStatus, BedType};
use crate::models::{Bed, BedAllocation};

#[derive(Debug, thiserror::Error)]
pub enum BedError {
    #[error("Bed not found: {0}")]
    BedNotFound(Uuid),
    #[error("Bed {bed_number} is not available ({status})")]
    BedNotAvailable { bed_number: String, status: BedStatus },
    #[error("Bed {0} is occupied")]
    BedOccupied(String),
    #[error("Bed status cannot be set to {0} directly")]
    InvalidStatusChange(BedStatus),
    #[error("Bed number {0} already exists")]
    DuplicateBedNumber(String),
    #[error("Admission not found: {0}")]
    AdmissionNotFound(Uuid),
    #[error("Admission {0} already holds a bed")]
    AdmissionAlreadyAllocated(Uuid),
    #[error("Bed allocation not found: {0}")]
    AllocationNotFound(Uuid),
    #[error("Bed allocation {0} was already released")]
    AllocationAlreadyReleased(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Request to add a bed to the register. New beds start Available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBedRequest {
    pub bed_number: String,
    pub department: String,
    pub ward: String,
    pub bed_type: BedType,
}

fn not_available(bed: &Bed) -> BedError {
    BedError::BedNotAvailable {
        bed_number: bed.bed_number.clone(),
        status: bed.status,
    }
}

// ── Allocation ──────────────────────────────────────────────

/// Allocate `bed_id` to `admission_id` on an already-open transaction.
pub fn allocate_within(
    conn: &Connection,
    admission_id: &Uuid,
    bed_id: &Uuid,
    notes: Option<&str>,
    actor: &str,
    now: NaiveDateTime,
) -> Result<BedAllocation, BedError> {
    let bed = repository::get_bed(conn, bed_id)?.ok_or(BedError::BedNotFound(*bed_id))?;
    if !bed.is_active || bed.status != BedStatus::Available {
        tracing::warn!(bed_id = %bed.id, status = %bed.status, "Bed not available for allocation");
        return Err(not_available(&bed));
    }
    if repository::find_current_allocation(conn, admission_id)?.is_some() {
        return Err(BedError::AdmissionAlreadyAllocated(*admission_id));
    }

    // The affected-row count is the real guard; the read above only picks
    // the error message.
    if !repository::occupy_bed_if_available(conn, bed_id)? {
        return Err(not_available(&bed));
    }

    let alloc = BedAllocation {
        id: Uuid::new_v4(),
        admission_id: *admission_id,
        bed_id: *bed_id,
        allocated_date: now,
        released_date: None,
        is_current: true,
        notes: notes.map(str::to_string),
        allocated_by: actor.to_string(),
    };
    repository::insert_allocation(conn, &alloc).map_err(|e| {
        if e.is_unique_violation() {
            not_available(&bed)
        } else {
            BedError::Database(e)
        }
    })?;

    tracing::info!(
        allocation_id = %alloc.id,
        admission_id = %admission_id,
        bed = %bed.bed_number,
        "Bed allocated"
    );
    Ok(alloc)
}

/// Allocate a bed to an existing admission in its own transaction.
pub fn allocate(
    conn: &Connection,
    admission_id: &Uuid,
    bed_id: &Uuid,
    notes: Option<&str>,
    actor: &str,
    now: NaiveDateTime,
) -> Result<BedAllocation, BedError> {
    let tx = begin_immediate(conn)?;
    if repository::get_admission(&tx, admission_id)?.is_none() {
        return Err(BedError::AdmissionNotFound(*admission_id));
    }
    let alloc = allocate_within(&tx, admission_id, bed_id, notes, actor, now)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(alloc)
}

/// Close an allocation. The bed keeps its status; callers that want it
/// back in the pool follow up with [`set_bed_available_within`].
pub fn release_within(
    conn: &Connection,
    allocation_id: &Uuid,
    now: NaiveDateTime,
) -> Result<BedAllocation, BedError> {
    let mut alloc = repository::get_allocation(conn, allocation_id)?
        .ok_or(BedError::AllocationNotFound(*allocation_id))?;
    if !alloc.is_current || !repository::close_allocation(conn, allocation_id, &now)? {
        return Err(BedError::AllocationAlreadyReleased(*allocation_id));
    }
    alloc.is_current = false;
    alloc.released_date = Some(now);

    tracing::info!(allocation_id = %alloc.id, bed_id = %alloc.bed_id, "Bed allocation released");
    Ok(alloc)
}

pub fn release(
    conn: &Connection,
    allocation_id: &Uuid,
    now: NaiveDateTime,
) -> Result<BedAllocation, BedError> {
    let tx = begin_immediate(conn)?;
    let alloc = release_within(&tx, allocation_id, now)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(alloc)
}

pub fn find_current(conn: &Connection, admission_id: &Uuid) -> Result<Option<BedAllocation>, BedError> {
    Ok(repository::find_current_allocation(conn, admission_id)?)
}

/// Every allocation an admission has held, oldest first.
pub fn allocation_history(conn: &Connection, admission_id: &Uuid) -> Result<Vec<BedAllocation>, BedError> {
    Ok(repository::list_allocations_for_admission(conn, admission_id)?)
}

// ── Bed status ──────────────────────────────────────────────

/// Return a bed to Available once nothing holds it.
pub fn set_bed_available_within(conn: &Connection, bed_id: &Uuid) -> Result<(), BedError> {
    let bed = repository::get_bed(conn, bed_id)?.ok_or(BedError::BedNotFound(*bed_id))?;
    if repository::find_current_allocation_for_bed(conn, bed_id)?.is_some() {
        return Err(BedError::BedOccupied(bed.bed_number));
    }
    repository::mark_bed_available(conn, bed_id)?;
    Ok(())
}

pub fn set_bed_available(conn: &Connection, bed_id: &Uuid) -> Result<(), BedError> {
    let tx = begin_immediate(conn)?;
    set_bed_available_within(&tx, bed_id)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(())
}

/// Administrative status change (maintenance, reservation, back to
/// available). Occupied beds are only freed through discharge or transfer.
pub fn set_bed_status(conn: &Connection, bed_id: &Uuid, status: BedStatus) -> Result<Bed, BedError> {
    if status == BedStatus::Occupied {
        return Err(BedError::InvalidStatusChange(status));
    }

    let tx = begin_immediate(conn)?;
    let mut bed = repository::get_bed(&tx, bed_id)?.ok_or(BedError::BedNotFound(*bed_id))?;
    if !repository::set_bed_status_unless_occupied(&tx, bed_id, status)? {
        return Err(BedError::BedOccupied(bed.bed_number));
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(bed_id = %bed.id, from = %bed.status, to = %status, "Bed status changed");
    bed.status = status;
    Ok(bed)
}

pub fn register_bed(conn: &Connection, req: &RegisterBedRequest) -> Result<Bed, BedError> {
    let bed = Bed {
        id: Uuid::new_v4(),
        bed_number: req.bed_number.trim().to_string(),
        department: req.department.clone(),
        ward: req.ward.clone(),
        bed_type: req.bed_type,
        status: BedStatus::Available,
        is_active: true,
    };
    repository::insert_bed(conn, &bed).map_err(|e| {
        if e.is_unique_violation() {
            BedError::DuplicateBedNumber(bed.bed_number.clone())
        } else {
            BedError::Database(e)
        }
    })?;

    tracing::info!(bed_id = %bed.id, bed_number = %bed.bed_number, "Bed registered");
    Ok(bed)
}

pub fn list_beds(conn: &Connection, filter: &BedFilter) -> Result<Vec<Bed>, BedError> {
    Ok(repository::list_beds(conn, filter)?)
}
