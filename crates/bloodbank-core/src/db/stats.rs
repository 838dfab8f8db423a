//! Aggregate counts behind the per-role dashboards.

use chrono::NaiveDate;
use rusqlite::params_from_iter;

use super::{Database, DbResult};
use crate::models::{AppointmentStatus, MatchStatus, RequestStatus, TestStatus, Urgency};

/// Numbered placeholders `?first, ...` for an `IN` list of `n` values.
fn placeholders(first: usize, n: usize) -> String {
    (first..first + n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Database {
    fn count(&self, sql: &str, values: Vec<String>) -> DbResult<u32> {
        let count = self
            .conn
            .query_row(sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count)
    }

    /// Units collected from a donor, whatever became of them.
    pub fn count_units_from_donor(&self, donor_id: &str) -> DbResult<u32> {
        self.count(
            "SELECT COUNT(*) FROM blood_units WHERE donor_id = ?1",
            vec![donor_id.to_string()],
        )
    }

    /// Appointments of a donor on or after `from` that are still booked.
    pub fn count_upcoming_appointments(&self, donor_id: &str, from: NaiveDate) -> DbResult<u32> {
        self.count(
            "SELECT COUNT(*) FROM appointments
             WHERE donor_id = ?1 AND appointment_date >= ?2 AND status IN (?3, ?4)",
            vec![
                donor_id.to_string(),
                from.format("%Y-%m-%d").to_string(),
                AppointmentStatus::Scheduled.as_str().to_string(),
                AppointmentStatus::Confirmed.as_str().to_string(),
            ],
        )
    }

    /// Matches of a donor in any of `statuses`.
    pub fn count_donor_matches(&self, donor_id: &str, statuses: &[MatchStatus]) -> DbResult<u32> {
        self.count_matches("donor_id", donor_id, statuses)
    }

    /// Matches of a patient in any of `statuses`.
    pub fn count_patient_matches(
        &self,
        patient_id: &str,
        statuses: &[MatchStatus],
    ) -> DbResult<u32> {
        self.count_matches("patient_id", patient_id, statuses)
    }

    fn count_matches(&self, column: &str, key: &str, statuses: &[MatchStatus]) -> DbResult<u32> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM donor_patient_matches WHERE {} = ?1 AND status IN ({})",
            column,
            placeholders(2, statuses.len())
        );
        let mut values = vec![key.to_string()];
        values.extend(statuses.iter().map(|s| s.as_str().to_string()));
        self.count(&sql, values)
    }

    pub fn count_requests_for_patient(&self, patient_id: &str) -> DbResult<u32> {
        self.count(
            "SELECT COUNT(*) FROM blood_requests WHERE patient_id = ?1",
            vec![patient_id.to_string()],
        )
    }

    /// Pending or approved requests at any of the given urgencies.
    pub fn count_open_requests(&self, urgencies: &[Urgency]) -> DbResult<u32> {
        if urgencies.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM blood_requests WHERE status IN (?1, ?2) AND urgency IN ({})",
            placeholders(3, urgencies.len())
        );
        let mut values = vec![
            RequestStatus::Pending.as_str().to_string(),
            RequestStatus::Approved.as_str().to_string(),
        ];
        values.extend(urgencies.iter().map(|u| u.as_str().to_string()));
        self.count(&sql, values)
    }

    /// Lab tests in `statuses` whose test date falls on `day` (UTC).
    pub fn count_tests_on(&self, day: NaiveDate, statuses: &[TestStatus]) -> DbResult<u32> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM blood_tests WHERE date(tested_at) = ?1 AND status IN ({})",
            placeholders(2, statuses.len())
        );
        let mut values = vec![day.format("%Y-%m-%d").to_string()];
        values.extend(statuses.iter().map(|s| s.as_str().to_string()));
        self.count(&sql, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Appointment, BloodRequest, BloodTest, BloodType, BloodUnit, Donor, DonorPatientMatch,
        LabOutcome, Patient, TestType,
    };
    use chrono::{NaiveTime, TimeZone, Utc};

    #[test]
    fn test_profile_counts() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let today = now.date_naive();

        let donor = Donor::new("alice".into(), now);
        db.insert_donor(&donor).unwrap();
        let patient = Patient::new("bob".into(), BloodType::APositive, Urgency::High, 1, now);
        db.insert_patient(&patient).unwrap();
        let request = BloodRequest::new(
            patient.patient_id.clone(),
            BloodType::APositive,
            1,
            Urgency::Emergency,
            now,
        );
        db.insert_request(&request).unwrap();
        let m = DonorPatientMatch::new(
            donor.donor_id.clone(),
            patient.patient_id.clone(),
            request.request_id.clone(),
            now,
        );
        db.insert_match_if_absent(&m).unwrap();

        let unit = BloodUnit::new(BloodType::APositive, Some(donor.donor_id.clone()), now, None, 450, now);
        db.insert_unit(&unit).unwrap();

        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let past = Appointment::new(donor.donor_id.clone(), today.pred_opt().unwrap(), nine, now);
        let upcoming = Appointment::new(donor.donor_id.clone(), today, nine, now);
        db.insert_appointment(&past).unwrap();
        db.insert_appointment(&upcoming).unwrap();

        assert_eq!(db.count_units_from_donor(&donor.donor_id).unwrap(), 1);
        assert_eq!(db.count_upcoming_appointments(&donor.donor_id, today).unwrap(), 1);
        assert_eq!(db.count_donor_matches(&donor.donor_id, &[MatchStatus::Pending]).unwrap(), 1);
        assert_eq!(
            db.count_patient_matches(&patient.patient_id, &[MatchStatus::Accepted])
                .unwrap(),
            0
        );
        assert_eq!(db.count_requests_for_patient(&patient.patient_id).unwrap(), 1);
        assert_eq!(db.count_open_requests(&[Urgency::Emergency]).unwrap(), 1);
        assert_eq!(db.count_open_requests(&[Urgency::Low]).unwrap(), 0);
        assert_eq!(db.count_open_requests(&[]).unwrap(), 0);
    }

    #[test]
    fn test_count_tests_on_day() {
        let db = Database::open_in_memory().unwrap();
        let today = Utc.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap();
        let passed = LabOutcome::Passed {
            blood_type: None,
            results: "clear".into(),
        };

        for at in [today, yesterday] {
            let test = BloodTest::from_outcome(TestType::PostCollection, &passed, None, at);
            db.insert_blood_test(&test).unwrap();
        }

        let day = today.date_naive();
        assert_eq!(db.count_tests_on(day, &[TestStatus::Completed]).unwrap(), 1);
        assert_eq!(db.count_tests_on(day, &[TestStatus::Failed]).unwrap(), 0);
    }
}
