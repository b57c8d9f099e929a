use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::StaffRole;
use crate::models::*;

/// Store an account together with the SHA-256 hash of its bearer token.
pub fn insert_staff_account(
    conn: &Connection,
    account: &StaffAccount,
    token_hash: &[u8],
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO staff_accounts (id, display_name, role, token_hash, practitioner_id, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account.id.to_string(),
            account.display_name,
            account.role.as_str(),
            token_hash,
            account.practitioner_id.map(|p| p.to_string()),
            account.is_active as i32,
        ],
    )?;
    Ok(())
}

/// Active account whose token hashes to `token_hash`.
pub fn find_staff_by_token_hash(
    conn: &Connection,
    token_hash: &[u8],
) -> Result<Option<StaffAccount>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, display_name, role, practitioner_id, is_active
             FROM staff_accounts WHERE token_hash = ?1 AND is_active = 1",
            params![token_hash],
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

    row.map(|(id, display_name, role, practitioner_id, is_active)| {
        Ok(StaffAccount {
            id: parse_uuid("staff_accounts.id", &id)?,
            display_name,
            role: StaffRole::from_str(&role)?,
            practitioner_id: practitioner_id
                .map(|p| parse_uuid("staff_accounts.practitioner_id", &p))
                .transpose()?,
            is_active: is_active != 0,
        })
    })
    .transpose()
}

pub fn count_staff_accounts(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM staff_accounts", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use uuid::Uuid;

    fn account(role: StaffRole, active: bool) -> StaffAccount {
        StaffAccount {
            id: Uuid::new_v4(),
            display_name: "Sam Reyes".into(),
            role,
            practitioner_id: None,
            is_active: active,
        }
    }

    #[test]
    fn lookup_by_token_hash() {
        let conn = open_memory_database().unwrap();
        let acc = account(StaffRole::Pharmacist, true);
        insert_staff_account(&conn, &acc, &[7u8; 32]).unwrap();

        let found = find_staff_by_token_hash(&conn, &[7u8; 32]).unwrap().unwrap();
        assert_eq!(found.id, acc.id);
        assert_eq!(found.role, StaffRole::Pharmacist);
        assert!(find_staff_by_token_hash(&conn, &[8u8; 32]).unwrap().is_none());
        assert_eq!(count_staff_accounts(&conn).unwrap(), 1);
    }

    #[test]
    fn inactive_account_not_found() {
        let conn = open_memory_database().unwrap();
        insert_staff_account(&conn, &account(StaffRole::Nurse, false), &[1u8; 32]).unwrap();
        assert!(find_staff_by_token_hash(&conn, &[1u8; 32]).unwrap().is_none());
    }
}
