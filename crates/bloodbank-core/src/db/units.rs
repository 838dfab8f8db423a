//! Blood unit inventory operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{label, Database, DbError, DbResult};
use crate::models::{BloodType, BloodUnit, UnitStatus};

const UNIT_COLUMNS: &str = "unit_id, blood_type, donor_id, collected_at, expires_at, quantity_ml, \
     status, reserved_for, test_results, notes, created_at, updated_at, blood_bank_id";

/// Per-type, per-status unit count and volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTally {
    pub blood_type: BloodType,
    pub status: UnitStatus,
    pub units: u32,
    pub total_ml: u64,
}

impl Database {
    /// Insert a new unit.
    pub fn insert_unit(&self, unit: &BloodUnit) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO blood_units ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                UNIT_COLUMNS
            ),
            params![
                unit.unit_id,
                unit.blood_type.as_str(),
                unit.donor_id,
                unit.collected_at,
                unit.expires_at,
                unit.quantity_ml,
                unit.status.as_str(),
                unit.reserved_for,
                unit.test_results,
                unit.notes,
                unit.created_at,
                unit.updated_at,
                unit.blood_bank_id,
            ],
        )?;
        Ok(())
    }

    /// Get a unit by ID.
    pub fn get_unit(&self, unit_id: &str) -> DbResult<Option<BloodUnit>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM blood_units WHERE unit_id = ?", UNIT_COLUMNS),
                [unit_id],
                UnitRow::from_row,
            )
            .optional()?
            .map(BloodUnit::try_from)
            .transpose()
    }

    /// Move a unit from `expected` to `status` only if it is still in `expected`.
    ///
    /// `reserved_for` is written together with the status; pass `None` to clear it.
    /// Returns false when the unit is missing or its status changed underneath.
    pub fn update_unit_status(
        &self,
        unit_id: &str,
        expected: UnitStatus,
        status: UnitStatus,
        reserved_for: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE blood_units SET
                status = ?3,
                reserved_for = ?4,
                updated_at = ?5
            WHERE unit_id = ?1 AND status = ?2
            "#,
            params![
                unit_id,
                expected.as_str(),
                status.as_str(),
                reserved_for,
                now,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Replace the free-text lab results of a unit.
    pub fn set_unit_test_results(
        &self,
        unit_id: &str,
        results: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE blood_units SET test_results = ?2, updated_at = ?3 WHERE unit_id = ?1",
            params![unit_id, results, now],
        )?;
        Ok(rows_affected > 0)
    }

    /// Count units of one type in one status.
    pub fn count_units(&self, blood_type: BloodType, status: UnitStatus) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM blood_units WHERE blood_type = ? AND status = ?",
            [blood_type.as_str(), status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count units in one status across all types.
    pub fn count_units_in_status(&self, status: UnitStatus) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM blood_units WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Unit counts and volumes grouped by type and status in one scan,
    /// optionally restricted to one blood bank.
    pub fn tally_units(&self, blood_bank_id: Option<&str>) -> DbResult<Vec<UnitTally>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT blood_type, status, COUNT(*), COALESCE(SUM(quantity_ml), 0)
            FROM blood_units
            WHERE ?1 IS NULL OR blood_bank_id = ?1
            GROUP BY blood_type, status
            "#,
        )?;

        let rows = stmt.query_map([blood_bank_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut tallies = Vec::new();
        for row in rows {
            let (blood_type, status, units, total_ml) = row?;
            tallies.push(UnitTally {
                blood_type: label(&blood_type)?,
                status: label(&status)?,
                units,
                total_ml: u64::try_from(total_ml).map_err(|_| {
                    DbError::Constraint(format!("Negative volume total: {}", total_ml))
                })?,
            });
        }
        Ok(tallies)
    }

    /// Units that are still expirable and whose expiry lies before `as_of`.
    pub fn list_overdue_units(&self, as_of: DateTime<Utc>) -> DbResult<Vec<BloodUnit>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM blood_units
            WHERE status IN ('collected', 'testing', 'ready', 'reserved')
              AND expires_at IS NOT NULL
            ORDER BY expires_at
            "#,
            UNIT_COLUMNS
        ))?;

        let rows = stmt.query_map([], UnitRow::from_row)?;

        let mut units = Vec::new();
        for row in rows {
            let unit: BloodUnit = row?.try_into()?;
            // Compared in Rust: stored text formats are not guaranteed to sort uniformly.
            if unit.is_past_expiry(as_of) {
                units.push(unit);
            }
        }
        Ok(units)
    }

    /// Units currently reserved against a request.
    pub fn list_units_reserved_for(&self, request_id: &str) -> DbResult<Vec<BloodUnit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM blood_units WHERE status = 'reserved' AND reserved_for = ? ORDER BY collected_at",
            UNIT_COLUMNS
        ))?;

        let rows = stmt.query_map([request_id], UnitRow::from_row)?;

        let mut units = Vec::new();
        for row in rows {
            units.push(row?.try_into()?);
        }
        Ok(units)
    }

    /// Units of one type in one status, oldest collection first.
    pub fn list_units(&self, blood_type: BloodType, status: UnitStatus) -> DbResult<Vec<BloodUnit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM blood_units WHERE blood_type = ? AND status = ? ORDER BY collected_at",
            UNIT_COLUMNS
        ))?;

        let rows = stmt.query_map([blood_type.as_str(), status.as_str()], UnitRow::from_row)?;

        let mut units = Vec::new();
        for row in rows {
            units.push(row?.try_into()?);
        }
        Ok(units)
    }
}

/// Intermediate row struct for database mapping.
struct UnitRow {
    unit_id: String,
    blood_type: String,
    donor_id: Option<String>,
    collected_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    quantity_ml: u32,
    status: String,
    reserved_for: Option<String>,
    test_results: String,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    blood_bank_id: Option<String>,
}

impl UnitRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            unit_id: row.get(0)?,
            blood_type: row.get(1)?,
            donor_id: row.get(2)?,
            collected_at: row.get(3)?,
            expires_at: row.get(4)?,
            quantity_ml: row.get(5)?,
            status: row.get(6)?,
            reserved_for: row.get(7)?,
            test_results: row.get(8)?,
            notes: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            blood_bank_id: row.get(12)?,
        })
    }
}

impl TryFrom<UnitRow> for BloodUnit {
    type Error = DbError;

    fn try_from(row: UnitRow) -> Result<Self, Self::Error> {
        Ok(BloodUnit {
            unit_id: row.unit_id,
            blood_type: label(&row.blood_type)?,
            donor_id: row.donor_id,
            collected_at: row.collected_at,
            expires_at: row.expires_at,
            quantity_ml: row.quantity_ml,
            status: label(&row.status)?,
            reserved_for: row.reserved_for,
            test_results: row.test_results,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            blood_bank_id: row.blood_bank_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn unit(blood_type: BloodType, status: UnitStatus) -> BloodUnit {
        let now = Utc::now();
        let mut unit = BloodUnit::new(blood_type, None, now, Some(now + Duration::days(42)), 450, now);
        unit.status = status;
        unit
    }

    #[test]
    fn test_insert_and_get_unit() {
        let db = setup_db();
        let u = unit(BloodType::APositive, UnitStatus::Collected);
        db.insert_unit(&u).unwrap();

        let retrieved = db.get_unit(&u.unit_id).unwrap().unwrap();
        assert_eq!(retrieved, u);
    }

    fn request_id(db: &Database) -> String {
        use crate::models::{BloodRequest, Patient, Urgency};
        let now = Utc::now();
        let patient = Patient::new(
            uuid::Uuid::new_v4().to_string(),
            BloodType::APositive,
            Urgency::Medium,
            1,
            now,
        );
        db.insert_patient(&patient).unwrap();
        let request = BloodRequest::new(patient.patient_id, BloodType::APositive, 1, Urgency::Medium, now);
        db.insert_request(&request).unwrap();
        request.request_id
    }

    #[test]
    fn test_conditional_status_update() {
        let db = setup_db();
        let u = unit(BloodType::APositive, UnitStatus::Ready);
        db.insert_unit(&u).unwrap();
        let first = request_id(&db);
        let second = request_id(&db);

        let now = Utc::now();
        // Stale expectation: nothing changes
        assert!(!db
            .update_unit_status(&u.unit_id, UnitStatus::Testing, UnitStatus::Ready, None, now)
            .unwrap());

        assert!(db
            .update_unit_status(&u.unit_id, UnitStatus::Ready, UnitStatus::Reserved, Some(first.as_str()), now)
            .unwrap());
        // Second writer with the same expectation loses
        assert!(!db
            .update_unit_status(&u.unit_id, UnitStatus::Ready, UnitStatus::Reserved, Some(second.as_str()), now)
            .unwrap());

        let retrieved = db.get_unit(&u.unit_id).unwrap().unwrap();
        assert_eq!(retrieved.status, UnitStatus::Reserved);
        assert_eq!(retrieved.reserved_for.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn test_counts_and_tally() {
        let db = setup_db();
        for _ in 0..3 {
            db.insert_unit(&unit(BloodType::OPositive, UnitStatus::Ready)).unwrap();
        }
        db.insert_unit(&unit(BloodType::OPositive, UnitStatus::Testing)).unwrap();
        db.insert_unit(&unit(BloodType::BNegative, UnitStatus::Ready)).unwrap();

        assert_eq!(db.count_units(BloodType::OPositive, UnitStatus::Ready).unwrap(), 3);
        assert_eq!(db.count_units(BloodType::AbPositive, UnitStatus::Ready).unwrap(), 0);
        assert_eq!(db.count_units_in_status(UnitStatus::Ready).unwrap(), 4);

        let tallies = db.tally_units(None).unwrap();
        let o_ready = tallies
            .iter()
            .find(|t| t.blood_type == BloodType::OPositive && t.status == UnitStatus::Ready)
            .unwrap();
        assert_eq!(o_ready.units, 3);
        assert_eq!(o_ready.total_ml, 1350);
    }

    #[test]
    fn test_list_overdue_units_skips_terminal_and_future() {
        let db = setup_db();
        let now = Utc::now();

        let mut overdue = unit(BloodType::APositive, UnitStatus::Ready);
        overdue.expires_at = Some(now - Duration::days(1));
        db.insert_unit(&overdue).unwrap();

        let mut used = unit(BloodType::APositive, UnitStatus::Used);
        used.expires_at = Some(now - Duration::days(1));
        db.insert_unit(&used).unwrap();

        db.insert_unit(&unit(BloodType::APositive, UnitStatus::Ready)).unwrap();

        let mut no_expiry = unit(BloodType::APositive, UnitStatus::Ready);
        no_expiry.expires_at = None;
        db.insert_unit(&no_expiry).unwrap();

        let units = db.list_overdue_units(now).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_id, overdue.unit_id);
    }
}
