//! Appointment operations.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{label, Database, DbError, DbResult};
use crate::models::{Appointment, AppointmentStatus};

const APPOINTMENT_COLUMNS: &str = "appointment_id, donor_id, appointment_date, appointment_time, \
     status, notes, created_at, updated_at";

impl Database {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO appointments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                APPOINTMENT_COLUMNS
            ),
            params![
                appointment.appointment_id,
                appointment.donor_id,
                appointment.date,
                appointment.time,
                appointment.status.as_str(),
                appointment.notes,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, appointment_id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM appointments WHERE appointment_id = ?",
                    APPOINTMENT_COLUMNS
                ),
                [appointment_id],
                AppointmentRow::from_row,
            )
            .optional()?
            .map(Appointment::try_from)
            .transpose()
    }

    /// Move an appointment from `expected` to `status` only if it is still in `expected`.
    pub fn update_appointment_status(
        &self,
        appointment_id: &str,
        expected: AppointmentStatus,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE appointments SET status = ?3, updated_at = ?4 WHERE appointment_id = ?1 AND status = ?2",
            params![appointment_id, expected.as_str(), status.as_str(), now],
        )?;
        Ok(rows_affected > 0)
    }

    /// Appointments of a donor, most recent slot first.
    pub fn list_appointments_for_donor(&self, donor_id: &str) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM appointments WHERE donor_id = ? ORDER BY appointment_date DESC, appointment_time DESC",
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map([donor_id], AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    appointment_id: String,
    donor_id: String,
    date: NaiveDate,
    time: NaiveTime,
    status: String,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            appointment_id: row.get(0)?,
            donor_id: row.get(1)?,
            date: row.get(2)?,
            time: row.get(3)?,
            status: row.get(4)?,
            notes: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            appointment_id: row.appointment_id,
            donor_id: row.donor_id,
            date: row.date,
            time: row.time,
            status: label(&row.status)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
