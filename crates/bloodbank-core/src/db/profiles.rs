//! Donor and patient profile operations.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{label, Database, DbError, DbResult};
use crate::models::{BloodType, Donor, Patient};

const DONOR_COLUMNS: &str = "donor_id, user_id, blood_type, last_donation_date, is_eligible, \
     is_deferred, health_status, medical_conditions, created_at, updated_at";

const PATIENT_COLUMNS: &str = "patient_id, user_id, blood_type_needed, urgency, units_needed, \
     medical_condition, created_at, updated_at";

impl Database {
    // =========================================================================
    // Donors
    // =========================================================================

    /// Insert a new donor.
    pub fn insert_donor(&self, donor: &Donor) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO donors ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                DONOR_COLUMNS
            ),
            params![
                donor.donor_id,
                donor.user_id,
                donor.blood_type.map(|t| t.as_str()),
                donor.last_donation_date,
                donor.is_eligible,
                donor.is_deferred,
                donor.health_status,
                donor.medical_conditions,
                donor.created_at,
                donor.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing donor.
    pub fn update_donor(&self, donor: &Donor) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE donors SET
                blood_type = ?2,
                last_donation_date = ?3,
                is_eligible = ?4,
                is_deferred = ?5,
                health_status = ?6,
                medical_conditions = ?7,
                updated_at = ?8
            WHERE donor_id = ?1
            "#,
            params![
                donor.donor_id,
                donor.blood_type.map(|t| t.as_str()),
                donor.last_donation_date,
                donor.is_eligible,
                donor.is_deferred,
                donor.health_status,
                donor.medical_conditions,
                donor.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a donor by ID.
    pub fn get_donor(&self, donor_id: &str) -> DbResult<Option<Donor>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM donors WHERE donor_id = ?", DONOR_COLUMNS),
                [donor_id],
                DonorRow::from_row,
            )
            .optional()?
            .map(Donor::try_from)
            .transpose()
    }

    /// Get the donor profile of a user identity.
    pub fn get_donor_by_user(&self, user_id: &str) -> DbResult<Option<Donor>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM donors WHERE user_id = ?", DONOR_COLUMNS),
                [user_id],
                DonorRow::from_row,
            )
            .optional()?
            .map(Donor::try_from)
            .transpose()
    }

    /// Eligible donors whose blood type is one of `types`, oldest profile first.
    pub fn list_eligible_donors(&self, types: &[BloodType]) -> DbResult<Vec<Donor>> {
        let mut donors = Vec::new();
        if types.is_empty() {
            return Ok(donors);
        }

        let placeholders = vec!["?"; types.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM donors WHERE is_eligible = 1 AND blood_type IN ({}) ORDER BY created_at",
            DONOR_COLUMNS, placeholders
        ))?;

        let labels: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
        let rows = stmt.query_map(rusqlite::params_from_iter(labels), DonorRow::from_row)?;
        for row in rows {
            donors.push(row?.try_into()?);
        }
        Ok(donors)
    }

    /// List all donors.
    pub fn list_donors(&self) -> DbResult<Vec<Donor>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM donors ORDER BY created_at",
            DONOR_COLUMNS
        ))?;
        let rows = stmt.query_map([], DonorRow::from_row)?;

        let mut donors = Vec::new();
        for row in rows {
            donors.push(row?.try_into()?);
        }
        Ok(donors)
    }

    /// Count eligible donors of one blood type.
    pub fn count_eligible_donors(&self, blood_type: BloodType) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM donors WHERE is_eligible = 1 AND blood_type = ?",
            [blood_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO patients ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                PATIENT_COLUMNS
            ),
            params![
                patient.patient_id,
                patient.user_id,
                patient.blood_type_needed.as_str(),
                patient.urgency.as_str(),
                patient.units_needed,
                patient.medical_condition,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE patient_id = ?", PATIENT_COLUMNS),
                [patient_id],
                PatientRow::from_row,
            )
            .optional()?
            .map(Patient::try_from)
            .transpose()
    }

    /// Get the patient profile of a user identity.
    pub fn get_patient_by_user(&self, user_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE user_id = ?", PATIENT_COLUMNS),
                [user_id],
                PatientRow::from_row,
            )
            .optional()?
            .map(Patient::try_from)
            .transpose()
    }
}

/// Intermediate row struct for donor mapping.
struct DonorRow {
    donor_id: String,
    user_id: String,
    blood_type: Option<String>,
    last_donation_date: Option<NaiveDate>,
    is_eligible: bool,
    is_deferred: bool,
    health_status: String,
    medical_conditions: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DonorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            donor_id: row.get(0)?,
            user_id: row.get(1)?,
            blood_type: row.get(2)?,
            last_donation_date: row.get(3)?,
            is_eligible: row.get(4)?,
            is_deferred: row.get(5)?,
            health_status: row.get(6)?,
            medical_conditions: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<DonorRow> for Donor {
    type Error = DbError;

    fn try_from(row: DonorRow) -> Result<Self, Self::Error> {
        Ok(Donor {
            donor_id: row.donor_id,
            user_id: row.user_id,
            blood_type: row.blood_type.as_deref().map(label).transpose()?,
            last_donation_date: row.last_donation_date,
            is_eligible: row.is_eligible,
            is_deferred: row.is_deferred,
            health_status: row.health_status,
            medical_conditions: row.medical_conditions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Intermediate row struct for patient mapping.
struct PatientRow {
    patient_id: String,
    user_id: String,
    blood_type_needed: String,
    urgency: String,
    units_needed: u32,
    medical_condition: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            patient_id: row.get(0)?,
            user_id: row.get(1)?,
            blood_type_needed: row.get(2)?,
            urgency: row.get(3)?,
            units_needed: row.get(4)?,
            medical_condition: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            patient_id: row.patient_id,
            user_id: row.user_id,
            blood_type_needed: label(&row.blood_type_needed)?,
            urgency: label(&row.urgency)?,
            units_needed: row.units_needed,
            medical_condition: row.medical_condition,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
