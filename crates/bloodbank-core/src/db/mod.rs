//! Database layer for the blood bank engine.
//!
//! Every status change goes through a conditional `UPDATE ... WHERE status = ?`
//! and reports whether a row changed, so the read-check-write sequences in the
//! engine stay atomic against other connections to the same file.

mod schema;
mod profiles;
mod banks;
mod units;
mod requests;
mod matches;
mod appointments;
mod lab;
mod notifications;
mod stats;

pub use schema::*;
pub use matches::ResponseColumn;
pub use units::UnitTally;

use std::path::Path;
use std::str::FromStr;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::models::ParseEnumError;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored value is invalid: {0}")]
    Parse(#[from] ParseEnumError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        // Wait for competing writers instead of failing immediately.
        self.conn.busy_timeout(std::time::Duration::from_secs(5))?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one write transaction: committed if `f` succeeds,
    /// rolled back if it fails.
    ///
    /// Calls made while a transaction is already open join it.
    pub fn atomically<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        if !self.conn.is_autocommit() {
            return f();
        }
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        // Dropping `tx` without commit rolls back.
        let value = f()?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    /// Delete the donor and patient profiles of a user identity.
    ///
    /// Matches, requests, appointments and tests hanging off those profiles
    /// cascade; blood units survive with their donor reference cleared.
    pub fn purge_identity(&self, user_id: &str) -> DbResult<usize> {
        let donors = self
            .conn
            .execute("DELETE FROM donors WHERE user_id = ?", [user_id])?;
        let patients = self
            .conn
            .execute("DELETE FROM patients WHERE user_id = ?", [user_id])?;
        Ok(donors + patients)
    }
}

/// Parse a stored enumeration label.
pub(crate) fn label<T>(value: &str) -> DbResult<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    Ok(value.parse::<T>()?)
}
