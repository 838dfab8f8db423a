//! Donation appointments.
//!
//! Completing an appointment is the only thing that records a donation: it
//! stamps the donor's last donation date and restarts the cooldown.

use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use crate::models::{Appointment, AppointmentStatus, Donor, Notification, NotificationCategory, Priority};

use super::{Engine, EngineError, EngineResult};

pub struct AppointmentBook<'a> {
    engine: Engine<'a>,
}

impl<'a> AppointmentBook<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self { engine }
    }

    /// Book a donation slot. Slots in the past are rejected.
    pub fn schedule(
        &self,
        donor_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> EngineResult<Appointment> {
        let donor = self.donor(donor_id)?;
        if date < self.engine.clock.today() {
            return Err(EngineError::Validation(format!(
                "cannot book an appointment in the past ({})",
                date
            )));
        }

        let appointment = Appointment::new(donor.donor_id, date, time, self.engine.clock.now());
        self.engine.db.insert_appointment(&appointment)?;
        info!(appointment_id = %appointment.appointment_id, %date, "appointment scheduled");

        self.engine.notify(Notification::new(
            &donor.user_id,
            NotificationCategory::Appointment,
            "Appointment Scheduled",
            format!(
                "Your donation appointment is scheduled for {} at {}.",
                date,
                time.format("%H:%M")
            ),
            Priority::Medium,
            self.engine.clock.now(),
        ));
        Ok(appointment)
    }

    pub fn confirm(&self, appointment_id: &str) -> EngineResult<Appointment> {
        self.move_to(appointment_id, AppointmentStatus::Confirmed)
            .map(|(appointment, _)| appointment)
    }

    pub fn cancel(&self, appointment_id: &str) -> EngineResult<Appointment> {
        self.move_to(appointment_id, AppointmentStatus::Cancelled)
            .map(|(appointment, _)| appointment)
    }

    pub fn mark_no_show(&self, appointment_id: &str) -> EngineResult<Appointment> {
        self.move_to(appointment_id, AppointmentStatus::NoShow)
            .map(|(appointment, _)| appointment)
    }

    /// Complete the appointment and record the donation on the donor.
    ///
    /// Appointments dated after today cannot be completed yet. A donor's last
    /// donation date never moves backwards. The status change and the donor
    /// update are written in one transaction.
    ///
    /// Returns the appointment and the updated donor.
    pub fn complete(&self, appointment_id: &str) -> EngineResult<(Appointment, Donor)> {
        self.engine
            .atomic(|engine| engine.appointments().complete_inner(appointment_id))
    }

    fn complete_inner(&self, appointment_id: &str) -> EngineResult<(Appointment, Donor)> {
        let today = self.engine.clock.today();
        let scheduled_on = self.appointment(appointment_id)?.date;
        if scheduled_on > today {
            return Err(EngineError::Validation(format!(
                "appointment {} is on {} and cannot be completed before then",
                appointment_id, scheduled_on
            )));
        }

        let (appointment, mut donor) = self.move_to(appointment_id, AppointmentStatus::Completed)?;

        let donated_on = donor
            .last_donation_date
            .map_or(appointment.date, |previous| previous.max(appointment.date));
        donor.last_donation_date = Some(donated_on);
        self.engine.registry().store_with_fresh_flag(&mut donor)?;

        let next = self.engine.eligibility().next_eligible_after(donated_on);
        info!(donor_id = %donor.donor_id, %donated_on, %next, "donation recorded");

        self.engine.notify(Notification::new(
            &donor.user_id,
            NotificationCategory::Appointment,
            "Thank you for donating!",
            format!("You're eligible to donate again on {}.", next.format("%Y-%m-%d")),
            Priority::High,
            self.engine.clock.now(),
        ));
        Ok((appointment, donor))
    }

    /// Appointments of a donor, latest slot first.
    pub fn list_for_donor(&self, donor_id: &str) -> EngineResult<Vec<Appointment>> {
        Ok(self.engine.db.list_appointments_for_donor(donor_id)?)
    }

    fn move_to(
        &self,
        appointment_id: &str,
        target: AppointmentStatus,
    ) -> EngineResult<(Appointment, Donor)> {
        let mut appointment = self.appointment(appointment_id)?;
        if !appointment.status.can_transition_to(target) {
            return Err(EngineError::InvalidTransition {
                entity: "appointment",
                id: appointment_id.to_string(),
                from: appointment.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = self.engine.clock.now();
        if !self.engine.db.update_appointment_status(
            appointment_id,
            appointment.status,
            target,
            now,
        )? {
            return Err(EngineError::conflict("appointment", appointment_id));
        }
        appointment.status = target;
        appointment.updated_at = now;

        let donor = self.donor(&appointment.donor_id)?;
        self.engine.notify(Notification::new(
            &donor.user_id,
            NotificationCategory::Appointment,
            "Appointment Updated",
            format!(
                "Your appointment on {} is now '{}'.",
                appointment.date,
                target.label()
            ),
            Priority::Medium,
            now,
        ));
        Ok((appointment, donor))
    }

    fn appointment(&self, appointment_id: &str) -> EngineResult<Appointment> {
        self.engine
            .db
            .get_appointment(appointment_id)?
            .ok_or_else(|| EngineError::not_found("appointment", appointment_id))
    }

    fn donor(&self, donor_id: &str) -> EngineResult<Donor> {
        self.engine
            .db
            .get_donor(donor_id)?
            .ok_or_else(|| EngineError::not_found("donor", donor_id))
    }
}
