//! Blood bank records.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::BloodBank;

const BANK_COLUMNS: &str = "blood_bank_id, name, hospital, address, phone, email, is_active, created_at";

impl Database {
    /// Insert a new blood bank.
    pub fn insert_blood_bank(&self, bank: &BloodBank) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO blood_banks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                BANK_COLUMNS
            ),
            params![
                bank.blood_bank_id,
                bank.name,
                bank.hospital,
                bank.address,
                bank.phone,
                bank.email,
                bank.is_active,
                bank.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_blood_bank(&self, blood_bank_id: &str) -> DbResult<Option<BloodBank>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM blood_banks WHERE blood_bank_id = ?", BANK_COLUMNS),
                [blood_bank_id],
                BankRow::from_row,
            )
            .optional()?
            .map(BloodBank::from))
    }

    /// Blood banks by name, optionally only the active ones.
    pub fn list_blood_banks(&self, active_only: bool) -> DbResult<Vec<BloodBank>> {
        let sql = if active_only {
            format!("SELECT {} FROM blood_banks WHERE is_active = 1 ORDER BY name", BANK_COLUMNS)
        } else {
            format!("SELECT {} FROM blood_banks ORDER BY name", BANK_COLUMNS)
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], BankRow::from_row)?;

        let mut banks = Vec::new();
        for row in rows {
            banks.push(row?.into());
        }
        Ok(banks)
    }
}

struct BankRow {
    blood_bank_id: String,
    name: String,
    hospital: String,
    address: String,
    phone: String,
    email: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl BankRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            blood_bank_id: row.get(0)?,
            name: row.get(1)?,
            hospital: row.get(2)?,
            address: row.get(3)?,
            phone: row.get(4)?,
            email: row.get(5)?,
            is_active: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl From<BankRow> for BloodBank {
    fn from(row: BankRow) -> Self {
        BloodBank {
            blood_bank_id: row.blood_bank_id,
            name: row.name,
            hospital: row.hospital,
            address: row.address,
            phone: row.phone,
            email: row.email,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}
