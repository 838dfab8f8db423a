//! Lab test and transfusion report operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{label, Database, DbError, DbResult};
use crate::models::{BloodTest, TransfusionReport};

const TEST_COLUMNS: &str =
    "test_id, unit_id, donor_id, test_type, status, results, lab_technician, tested_at";

impl Database {
    /// Insert a lab test record.
    pub fn insert_blood_test(&self, test: &BloodTest) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO blood_tests ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                TEST_COLUMNS
            ),
            params![
                test.test_id,
                test.unit_id,
                test.donor_id,
                test.test_type.as_str(),
                test.status.as_str(),
                test.results,
                test.lab_technician,
                test.tested_at,
            ],
        )?;
        Ok(())
    }

    /// Tests recorded for a donor, newest first.
    pub fn list_tests_for_donor(&self, donor_id: &str) -> DbResult<Vec<BloodTest>> {
        self.query_tests(
            &format!(
                "SELECT {} FROM blood_tests WHERE donor_id = ? ORDER BY tested_at DESC",
                TEST_COLUMNS
            ),
            donor_id,
        )
    }

    /// Tests recorded for a unit, newest first.
    pub fn list_tests_for_unit(&self, unit_id: &str) -> DbResult<Vec<BloodTest>> {
        self.query_tests(
            &format!(
                "SELECT {} FROM blood_tests WHERE unit_id = ? ORDER BY tested_at DESC",
                TEST_COLUMNS
            ),
            unit_id,
        )
    }

    fn query_tests(&self, sql: &str, key: &str) -> DbResult<Vec<BloodTest>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([key], TestRow::from_row)?;

        let mut tests = Vec::new();
        for row in rows {
            tests.push(row?.try_into()?);
        }
        Ok(tests)
    }

    /// Insert a transfusion report.
    pub fn insert_transfusion_report(&self, report: &TransfusionReport) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO transfusion_reports (
                report_id, patient_id, unit_id, outcome, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                report.report_id,
                report.patient_id,
                report.unit_id,
                report.outcome.as_str(),
                report.notes,
                report.created_at,
            ],
        )?;
        Ok(())
    }

    /// Transfusion reports of a patient, newest first.
    pub fn list_transfusions_for_patient(&self, patient_id: &str) -> DbResult<Vec<TransfusionReport>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT report_id, patient_id, unit_id, outcome, notes, created_at
            FROM transfusion_reports
            WHERE patient_id = ?
            ORDER BY created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, DateTime<Utc>>(5)?,
            ))
        })?;

        let mut reports = Vec::new();
        for row in rows {
            let (report_id, patient_id, unit_id, outcome, notes, created_at) = row?;
            reports.push(TransfusionReport {
                report_id,
                patient_id,
                unit_id,
                outcome: label(&outcome)?,
                notes,
                created_at,
            });
        }
        Ok(reports)
    }
}

/// Intermediate row struct for database mapping.
struct TestRow {
    test_id: String,
    unit_id: Option<String>,
    donor_id: Option<String>,
    test_type: String,
    status: String,
    results: String,
    lab_technician: Option<String>,
    tested_at: DateTime<Utc>,
}

impl TestRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            test_id: row.get(0)?,
            unit_id: row.get(1)?,
            donor_id: row.get(2)?,
            test_type: row.get(3)?,
            status: row.get(4)?,
            results: row.get(5)?,
            lab_technician: row.get(6)?,
            tested_at: row.get(7)?,
        })
    }
}

impl TryFrom<TestRow> for BloodTest {
    type Error = DbError;

    fn try_from(row: TestRow) -> Result<Self, Self::Error> {
        Ok(BloodTest {
            test_id: row.test_id,
            unit_id: row.unit_id,
            donor_id: row.donor_id,
            test_type: label(&row.test_type)?,
            status: label(&row.status)?,
            results: row.results,
            lab_technician: row.lab_technician,
            tested_at: row.tested_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodType, Donor, LabOutcome, Patient, TestType, TransfusionOutcome, Urgency};

    #[test]
    fn test_insert_and_list_donor_tests() {
        let db = Database::open_in_memory().unwrap();
        let donor = Donor::new("user-1".into(), Utc::now());
        db.insert_donor(&donor).unwrap();

        let outcome = LabOutcome::Passed {
            blood_type: Some(BloodType::APositive),
            results: "A+ confirmed".into(),
        };
        let mut test = BloodTest::from_outcome(TestType::PreDonation, &outcome, Some("tech-1".into()), Utc::now());
        test.donor_id = Some(donor.donor_id.clone());
        db.insert_blood_test(&test).unwrap();

        let tests = db.list_tests_for_donor(&donor.donor_id).unwrap();
        assert_eq!(tests, vec![test]);
    }

    #[test]
    fn test_insert_and_list_transfusions() {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("user-2".into(), BloodType::APositive, Urgency::Low, 1, Utc::now());
        db.insert_patient(&patient).unwrap();

        let report = TransfusionReport {
            report_id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient.patient_id.clone(),
            unit_id: None,
            outcome: TransfusionOutcome::Complication,
            notes: "mild fever".into(),
            created_at: Utc::now(),
        };
        db.insert_transfusion_report(&report).unwrap();

        let reports = db.list_transfusions_for_patient(&patient.patient_id).unwrap();
        assert_eq!(reports, vec![report]);
    }
}
