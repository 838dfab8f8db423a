//! Donor-patient match operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{label, Database, DbError, DbResult};
use crate::models::{DonorPatientMatch, MatchStatus};

const MATCH_COLUMNS: &str = "match_id, donor_id, patient_id, request_id, status, donor_response, \
     patient_response, created_at, updated_at";

/// Which response column a match update writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseColumn {
    Donor,
    Patient,
}

impl Database {
    /// Insert a match unless the (donor, request) pair already has one.
    ///
    /// Returns true when a row was created.
    pub fn insert_match_if_absent(&self, m: &DonorPatientMatch) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO donor_patient_matches ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                MATCH_COLUMNS
            ),
            params![
                m.match_id,
                m.donor_id,
                m.patient_id,
                m.request_id,
                m.status.as_str(),
                m.donor_response,
                m.patient_response,
                m.created_at,
                m.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a match by ID.
    pub fn get_match(&self, match_id: &str) -> DbResult<Option<DonorPatientMatch>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM donor_patient_matches WHERE match_id = ?",
                    MATCH_COLUMNS
                ),
                [match_id],
                MatchRow::from_row,
            )
            .optional()?
            .map(DonorPatientMatch::try_from)
            .transpose()
    }

    /// Record a response and move the match out of `expected` in one statement.
    pub fn record_match_response(
        &self,
        match_id: &str,
        expected: MatchStatus,
        status: MatchStatus,
        column: ResponseColumn,
        response: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let sql = match column {
            ResponseColumn::Donor => {
                "UPDATE donor_patient_matches SET status = ?3, donor_response = ?4, updated_at = ?5 \
                 WHERE match_id = ?1 AND status = ?2"
            }
            ResponseColumn::Patient => {
                "UPDATE donor_patient_matches SET status = ?3, patient_response = ?4, updated_at = ?5 \
                 WHERE match_id = ?1 AND status = ?2"
            }
        };
        let rows_affected = self.conn.execute(
            sql,
            params![match_id, expected.as_str(), status.as_str(), response, now],
        )?;
        Ok(rows_affected > 0)
    }

    /// Move a match from `expected` to `status` only if it is still in `expected`.
    pub fn update_match_status(
        &self,
        match_id: &str,
        expected: MatchStatus,
        status: MatchStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE donor_patient_matches SET status = ?3, updated_at = ?4 WHERE match_id = ?1 AND status = ?2",
            params![match_id, expected.as_str(), status.as_str(), now],
        )?;
        Ok(rows_affected > 0)
    }

    /// All matches created for a request, oldest first.
    pub fn list_matches_for_request(&self, request_id: &str) -> DbResult<Vec<DonorPatientMatch>> {
        self.query_matches(
            &format!(
                "SELECT {} FROM donor_patient_matches WHERE request_id = ? ORDER BY created_at",
                MATCH_COLUMNS
            ),
            request_id,
        )
    }

    /// All matches offered to a donor, newest first.
    pub fn list_matches_for_donor(&self, donor_id: &str) -> DbResult<Vec<DonorPatientMatch>> {
        self.query_matches(
            &format!(
                "SELECT {} FROM donor_patient_matches WHERE donor_id = ? ORDER BY created_at DESC",
                MATCH_COLUMNS
            ),
            donor_id,
        )
    }

    /// All matches for a patient, newest first.
    pub fn list_matches_for_patient(&self, patient_id: &str) -> DbResult<Vec<DonorPatientMatch>> {
        self.query_matches(
            &format!(
                "SELECT {} FROM donor_patient_matches WHERE patient_id = ? ORDER BY created_at DESC",
                MATCH_COLUMNS
            ),
            patient_id,
        )
    }

    fn query_matches(&self, sql: &str, key: &str) -> DbResult<Vec<DonorPatientMatch>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([key], MatchRow::from_row)?;

        let mut matches = Vec::new();
        for row in rows {
            matches.push(row?.try_into()?);
        }
        Ok(matches)
    }
}

/// Intermediate row struct for database mapping.
struct MatchRow {
    match_id: String,
    donor_id: String,
    patient_id: String,
    request_id: String,
    status: String,
    donor_response: String,
    patient_response: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MatchRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            match_id: row.get(0)?,
            donor_id: row.get(1)?,
            patient_id: row.get(2)?,
            request_id: row.get(3)?,
            status: row.get(4)?,
            donor_response: row.get(5)?,
            patient_response: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl TryFrom<MatchRow> for DonorPatientMatch {
    type Error = DbError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        Ok(DonorPatientMatch {
            match_id: row.match_id,
            donor_id: row.donor_id,
            patient_id: row.patient_id,
            request_id: row.request_id,
            status: label(&row.status)?,
            donor_response: row.donor_response,
            patient_response: row.patient_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodRequest, BloodType, Donor, Patient, Urgency};

    struct Fixture {
        db: Database,
        donor: Donor,
        patient: Patient,
        request: BloodRequest,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let mut donor = Donor::new("donor-user".into(), now);
        donor.blood_type = Some(BloodType::OPositive);
        donor.is_eligible = true;
        db.insert_donor(&donor).unwrap();

        let patient = Patient::new("patient-user".into(), BloodType::OPositive, Urgency::High, 1, now);
        db.insert_patient(&patient).unwrap();

        let request = BloodRequest::new(patient.patient_id.clone(), BloodType::OPositive, 1, Urgency::High, now);
        db.insert_request(&request).unwrap();

        Fixture { db, donor, patient, request }
    }

    fn new_match(f: &Fixture) -> DonorPatientMatch {
        DonorPatientMatch::new(
            f.donor.donor_id.clone(),
            f.patient.patient_id.clone(),
            f.request.request_id.clone(),
            Utc::now(),
        )
    }

    #[test]
    fn test_insert_if_absent_rejects_duplicate_pair() {
        let f = setup();
        let first = new_match(&f);
        assert!(f.db.insert_match_if_absent(&first).unwrap());

        let second = new_match(&f);
        assert!(!f.db.insert_match_if_absent(&second).unwrap());

        assert_eq!(f.db.list_matches_for_request(&f.request.request_id).unwrap().len(), 1);
        assert!(f.db.get_match(&second.match_id).unwrap().is_none());
    }

    #[test]
    fn test_record_response_is_one_shot() {
        let f = setup();
        let m = new_match(&f);
        f.db.insert_match_if_absent(&m).unwrap();
        let now = Utc::now();

        assert!(f
            .db
            .record_match_response(
                &m.match_id,
                MatchStatus::Pending,
                MatchStatus::Accepted,
                ResponseColumn::Donor,
                "I accept",
                now,
            )
            .unwrap());
        assert!(!f
            .db
            .record_match_response(
                &m.match_id,
                MatchStatus::Pending,
                MatchStatus::Declined,
                ResponseColumn::Patient,
                "no",
                now,
            )
            .unwrap());

        let stored = f.db.get_match(&m.match_id).unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Accepted);
        assert_eq!(stored.donor_response, "I accept");
        assert_eq!(stored.patient_response, "");
    }

    #[test]
    fn test_list_matches_by_side() {
        let f = setup();
        let m = new_match(&f);
        f.db.insert_match_if_absent(&m).unwrap();

        assert_eq!(f.db.list_matches_for_donor(&f.donor.donor_id).unwrap().len(), 1);
        assert_eq!(f.db.list_matches_for_patient(&f.patient.patient_id).unwrap().len(), 1);
        assert!(f
            .db
            .update_match_status(&m.match_id, MatchStatus::Pending, MatchStatus::Cancelled, Utc::now())
            .unwrap());
        assert_eq!(
            f.db.get_match(&m.match_id).unwrap().unwrap().status,
            MatchStatus::Cancelled
        );
    }
}
