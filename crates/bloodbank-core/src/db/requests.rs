//! Blood request operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{label, Database, DbError, DbResult};
use crate::models::{BloodRequest, FulfillmentType, RequestStatus, Urgency};

const REQUEST_COLUMNS: &str = "request_id, patient_id, blood_type_needed, quantity_units, urgency, \
     status, fulfillment_type, notes, created_at, updated_at";

impl Database {
    /// Insert a new request.
    pub fn insert_request(&self, request: &BloodRequest) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO blood_requests ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                REQUEST_COLUMNS
            ),
            params![
                request.request_id,
                request.patient_id,
                request.blood_type_needed.as_str(),
                request.quantity_units,
                request.urgency.as_str(),
                request.status.as_str(),
                request.fulfillment_type.map(|f| f.as_str()),
                request.notes,
                request.created_at,
                request.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a request by ID.
    pub fn get_request(&self, request_id: &str) -> DbResult<Option<BloodRequest>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM blood_requests WHERE request_id = ?",
                    REQUEST_COLUMNS
                ),
                [request_id],
                RequestRow::from_row,
            )
            .optional()?
            .map(BloodRequest::try_from)
            .transpose()
    }

    /// Move a request from `expected` to `status` only if it is still in `expected`.
    ///
    /// A `Some` fulfillment type overwrites the stored one; `None` keeps it.
    pub fn update_request_status(
        &self,
        request_id: &str,
        expected: RequestStatus,
        status: RequestStatus,
        fulfillment_type: Option<FulfillmentType>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE blood_requests SET
                status = ?3,
                fulfillment_type = COALESCE(?4, fulfillment_type),
                updated_at = ?5
            WHERE request_id = ?1 AND status = ?2
            "#,
            params![
                request_id,
                expected.as_str(),
                status.as_str(),
                fulfillment_type.map(|f| f.as_str()),
                now,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Open requests (pending or approved) at a given urgency, newest first.
    pub fn list_open_requests_by_urgency(&self, urgency: Urgency) -> DbResult<Vec<BloodRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM blood_requests
            WHERE urgency = ? AND status IN ('pending', 'approved')
            ORDER BY created_at DESC
            "#,
            REQUEST_COLUMNS
        ))?;

        let rows = stmt.query_map([urgency.as_str()], RequestRow::from_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }

    /// All requests of a patient, newest first.
    pub fn list_requests_for_patient(&self, patient_id: &str) -> DbResult<Vec<BloodRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM blood_requests WHERE patient_id = ? ORDER BY created_at DESC",
            REQUEST_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], RequestRow::from_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }
}

/// Intermediate row struct for database mapping.
struct RequestRow {
    request_id: String,
    patient_id: String,
    blood_type_needed: String,
    quantity_units: u32,
    urgency: String,
    status: String,
    fulfillment_type: Option<String>,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequestRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            request_id: row.get(0)?,
            patient_id: row.get(1)?,
            blood_type_needed: row.get(2)?,
            quantity_units: row.get(3)?,
            urgency: row.get(4)?,
            status: row.get(5)?,
            fulfillment_type: row.get(6)?,
            notes: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<RequestRow> for BloodRequest {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(BloodRequest {
            request_id: row.request_id,
            patient_id: row.patient_id,
            blood_type_needed: label(&row.blood_type_needed)?,
            quantity_units: row.quantity_units,
            urgency: label(&row.urgency)?,
            status: label(&row.status)?,
            fulfillment_type: row.fulfillment_type.as_deref().map(label).transpose()?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodType, Patient};
    use chrono::Duration;

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new(
            "user-1".into(),
            BloodType::OPositive,
            Urgency::Emergency,
            2,
            Utc::now(),
        );
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    #[test]
    fn test_insert_and_get_request() {
        let (db, patient) = setup_db();
        let request = BloodRequest::new(
            patient.patient_id.clone(),
            BloodType::OPositive,
            2,
            Urgency::High,
            Utc::now(),
        );
        db.insert_request(&request).unwrap();

        let retrieved = db.get_request(&request.request_id).unwrap().unwrap();
        assert_eq!(retrieved, request);
    }

    #[test]
    fn test_conditional_request_update_keeps_fulfillment() {
        let (db, patient) = setup_db();
        let request = BloodRequest::new(
            patient.patient_id.clone(),
            BloodType::OPositive,
            1,
            Urgency::High,
            Utc::now(),
        );
        db.insert_request(&request).unwrap();
        let now = Utc::now();

        assert!(db
            .update_request_status(
                &request.request_id,
                RequestStatus::Pending,
                RequestStatus::Approved,
                Some(FulfillmentType::BloodBank),
                now,
            )
            .unwrap());
        assert!(!db
            .update_request_status(
                &request.request_id,
                RequestStatus::Pending,
                RequestStatus::Cancelled,
                None,
                now,
            )
            .unwrap());
        assert!(db
            .update_request_status(
                &request.request_id,
                RequestStatus::Approved,
                RequestStatus::Fulfilled,
                None,
                now,
            )
            .unwrap());

        let retrieved = db.get_request(&request.request_id).unwrap().unwrap();
        assert_eq!(retrieved.status, RequestStatus::Fulfilled);
        assert_eq!(retrieved.fulfillment_type, Some(FulfillmentType::BloodBank));
    }

    #[test]
    fn test_list_open_emergency_requests_newest_first() {
        let (db, patient) = setup_db();
        let base = Utc::now();

        let older = BloodRequest::new(patient.patient_id.clone(), BloodType::OPositive, 1, Urgency::Emergency, base);
        let newer = BloodRequest::new(
            patient.patient_id.clone(),
            BloodType::OPositive,
            1,
            Urgency::Emergency,
            base + Duration::minutes(5),
        );
        let mut closed = BloodRequest::new(patient.patient_id.clone(), BloodType::OPositive, 1, Urgency::Emergency, base);
        closed.status = RequestStatus::Fulfilled;
        let routine = BloodRequest::new(patient.patient_id.clone(), BloodType::OPositive, 1, Urgency::Low, base);

        for r in [&older, &newer, &closed, &routine] {
            db.insert_request(r).unwrap();
        }

        let open = db.list_open_requests_by_urgency(Urgency::Emergency).unwrap();
        let ids: Vec<_> = open.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec![newer.request_id.as_str(), older.request_id.as_str()]);

        assert_eq!(db.list_requests_for_patient(&patient.patient_id).unwrap().len(), 4);
    }
}
