use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

/// Optional filters for bed listings.
#[derive(Debug, Clone, Default)]
pub struct BedFilter {
    pub status: Option<BedStatus>,
    pub ward: Option<String>,
}

pub fn insert_bed(conn: &Connection, bed: &Bed) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO beds (id, bed_number, department, ward, bed_type, status, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            bed.id.to_string(),
            bed.bed_number,
            bed.department,
            bed.ward,
            bed.bed_type.as_str(),
            bed.status.as_str(),
            bed.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_bed(conn: &Connection, id: &Uuid) -> Result<Option<Bed>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, bed_number, department, ward, bed_type, status, is_active
             FROM beds WHERE id = ?1",
            params![id.to_string()],
            bed_row_from_rusqlite,
        )
        .optional()?;
    row.map(bed_from_row).transpose()
}

pub fn list_beds(conn: &Connection, filter: &BedFilter) -> Result<Vec<Bed>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, bed_number, department, ward, bed_type, status, is_active
         FROM beds
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR ward = ?2)
         ORDER BY ward ASC, bed_number ASC",
    )?;
    let rows = stmt.query_map(
        params![filter.status.map(|s| s.as_str()), filter.ward],
        bed_row_from_rusqlite,
    )?;

    let mut beds = Vec::new();
    for row in rows {
        beds.push(bed_from_row(row?)?);
    }
    Ok(beds)
}

/// Flip an active, available bed to occupied. Returns false when the bed
/// was not available at the moment of the write.
pub fn occupy_bed_if_available(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE beds SET status = 'occupied'
         WHERE id = ?1 AND status = 'available' AND is_active = 1",
        params![id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Set any status except through an occupied bed. Returns false when the
/// bed is currently occupied.
pub fn set_bed_status_unless_occupied(
    conn: &Connection,
    id: &Uuid,
    status: BedStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE beds SET status = ?2 WHERE id = ?1 AND status != 'occupied'",
        params![id.to_string(), status.as_str()],
    )?;
    Ok(changed == 1)
}

/// Return a bed to the available pool after its allocation was released.
pub fn mark_bed_available(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE beds SET status = 'available' WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Bed".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ── Allocations ─────────────────────────────────────────────

const ALLOCATION_COLUMNS: &str =
    "id, admission_id, bed_id, allocated_date, released_date, is_current, notes, allocated_by";

pub fn insert_allocation(conn: &Connection, alloc: &BedAllocation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bed_allocations (id, admission_id, bed_id, allocated_date, released_date,
         is_current, notes, allocated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            alloc.id.to_string(),
            alloc.admission_id.to_string(),
            alloc.bed_id.to_string(),
            format_timestamp(&alloc.allocated_date),
            alloc.released_date.as_ref().map(format_timestamp),
            alloc.is_current as i32,
            alloc.notes,
            alloc.allocated_by,
        ],
    )?;
    Ok(())
}

pub fn get_allocation(conn: &Connection, id: &Uuid) -> Result<Option<BedAllocation>, DatabaseError> {
    let sql = format!("SELECT {ALLOCATION_COLUMNS} FROM bed_allocations WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], allocation_row_from_rusqlite)
        .optional()?;
    row.map(allocation_from_row).transpose()
}

/// The allocation currently held by an admission, if any.
pub fn find_current_allocation(
    conn: &Connection,
    admission_id: &Uuid,
) -> Result<Option<BedAllocation>, DatabaseError> {
    let sql = format!(
        "SELECT {ALLOCATION_COLUMNS} FROM bed_allocations
         WHERE admission_id = ?1 AND is_current = 1"
    );
    let row = conn
        .query_row(&sql, params![admission_id.to_string()], allocation_row_from_rusqlite)
        .optional()?;
    row.map(allocation_from_row).transpose()
}

/// The allocation currently holding a bed, if any.
pub fn find_current_allocation_for_bed(
    conn: &Connection,
    bed_id: &Uuid,
) -> Result<Option<BedAllocation>, DatabaseError> {
    let sql = format!(
        "SELECT {ALLOCATION_COLUMNS} FROM bed_allocations
         WHERE bed_id = ?1 AND is_current = 1"
    );
    let row = conn
        .query_row(&sql, params![bed_id.to_string()], allocation_row_from_rusqlite)
        .optional()?;
    row.map(allocation_from_row).transpose()
}

pub fn list_allocations_for_admission(
    conn: &Connection,
    admission_id: &Uuid,
) -> Result<Vec<BedAllocation>, DatabaseError> {
    let sql = format!(
        "SELECT {ALLOCATION_COLUMNS} FROM bed_allocations
         WHERE admission_id = ?1
         ORDER BY allocated_date ASC, rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![admission_id.to_string()], allocation_row_from_rusqlite)?;

    let mut allocs = Vec::new();
    for row in rows {
        allocs.push(allocation_from_row(row?)?);
    }
    Ok(allocs)
}

/// Close a current allocation. Returns false if it was already released.
pub fn close_allocation(
    conn: &Connection,
    id: &Uuid,
    released_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE bed_allocations SET is_current = 0, released_date = ?2
         WHERE id = ?1 AND is_current = 1",
        params![id.to_string(), format_timestamp(released_at)],
    )?;
    Ok(changed == 1)
}

struct BedRow {
    id: String,
    bed_number: String,
    department: String,
    ward: String,
    bed_type: String,
    status: String,
    is_active: i32,
}

fn bed_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<BedRow, rusqlite::Error> {
    Ok(BedRow {
        id: row.get(0)?,
        bed_number: row.get(1)?,
        department: row.get(2)?,
        ward: row.get(3)?,
        bed_type: row.get(4)?,
        status: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn bed_from_row(row: BedRow) -> Result<Bed, DatabaseError> {
    Ok(Bed {
        id: parse_uuid("beds.id", &row.id)?,
        bed_number: row.bed_number,
        department: row.department,
        ward: row.ward,
        bed_type: BedType::from_str(&row.bed_type)?,
        status: BedStatus::from_str(&row.status)?,
        is_active: row.is_active != 0,
    })
}

struct AllocationRow {
    id: String,
    admission_id: String,
    bed_id: String,
    allocated_date: String,
    released_date: Option<String>,
    is_current: i32,
    notes: Option<String>,
    allocated_by: String,
}

fn allocation_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AllocationRow, rusqlite::Error> {
    Ok(AllocationRow {
        id: row.get(0)?,
        admission_id: row.get(1)?,
        bed_id: row.get(2)?,
        allocated_date: row.get(3)?,
        released_date: row.get(4)?,
        is_current: row.get(5)?,
        notes: row.get(6)?,
        allocated_by: row.get(7)?,
    })
}

fn allocation_from_row(row: AllocationRow) -> Result<BedAllocation, DatabaseError> {
    Ok(BedAllocation {
        id: parse_uuid("bed_allocations.id", &row.id)?,
        admission_id: parse_uuid("bed_allocations.admission_id", &row.admission_id)?,
        bed_id: parse_uuid("bed_allocations.bed_id", &row.bed_id)?,
        allocated_date: parse_timestamp("bed_allocations.allocated_date", &row.allocated_date)?,
        released_date: row
            .released_date
            .map(|d| parse_timestamp("bed_allocations.released_date", &d))
            .transpose()?,
        is_current: row.is_current != 0,
        notes: row.notes,
        allocated_by: row.allocated_by,
    })
}
