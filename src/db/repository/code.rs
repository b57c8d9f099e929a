use chrono::NaiveDate;
use rusqlite::{params, Connection};

use crate::db::DatabaseError;

pub const APPOINTMENT_CODE_PREFIX: &str = "APT";
pub const ADMISSION_CODE_PREFIX: &str = "ADM";
pub const PRESCRIPTION_CODE_PREFIX: &str = "RX";
pub const DISPENSING_CODE_PREFIX: &str = "DSP";

/// Next human-readable code `<PREFIX>-<YYYYMMDD>-<NNNN>` for `day`.
///
/// The counter row per `(prefix, day)` is bumped in a single upsert, so
/// concurrent writers never read the same value. Numbering restarts at
/// 0001 each day.
pub fn generate_code(
    conn: &Connection,
    prefix: &str,
    day: NaiveDate,
) -> Result<String, DatabaseError> {
    let day_key = day.format("%Y%m%d").to_string();
    let next: i64 = conn.query_row(
        "INSERT INTO code_sequences (prefix, day, last_value) VALUES (?1, ?2, 1)
         ON CONFLICT(prefix, day) DO UPDATE SET last_value = last_value + 1
         RETURNING last_value",
        params![prefix, day_key],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}-{day_key}-{next:04}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn first_code_of_the_day_is_0001() {
        let conn = open_memory_database().unwrap();
        let code = generate_code(&conn, APPOINTMENT_CODE_PREFIX, day(1)).unwrap();
        assert_eq!(code, "APT-20240601-0001");
    }

    #[test]
    fn codes_increment_within_a_day() {
        let conn = open_memory_database().unwrap();
        generate_code(&conn, APPOINTMENT_CODE_PREFIX, day(1)).unwrap();
        generate_code(&conn, APPOINTMENT_CODE_PREFIX, day(1)).unwrap();
        let third = generate_code(&conn, APPOINTMENT_CODE_PREFIX, day(1)).unwrap();
        assert_eq!(third, "APT-20240601-0003");
    }

    #[test]
    fn sequence_resets_per_day() {
        let conn = open_memory_database().unwrap();
        generate_code(&conn, ADMISSION_CODE_PREFIX, day(1)).unwrap();
        let next_day = generate_code(&conn, ADMISSION_CODE_PREFIX, day(2)).unwrap();
        assert_eq!(next_day, "ADM-20240602-0001");
    }

    #[test]
    fn prefixes_have_independent_sequences() {
        let conn = open_memory_database().unwrap();
        generate_code(&conn, APPOINTMENT_CODE_PREFIX, day(1)).unwrap();
        generate_code(&conn, APPOINTMENT_CODE_PREFIX, day(1)).unwrap();
        let rx = generate_code(&conn, PRESCRIPTION_CODE_PREFIX, day(1)).unwrap();
        assert_eq!(rx, "RX-20240601-0001");
    }
}
