//! Donor and patient profiles, and upkeep of the cached eligibility flag.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::models::{BloodBank, BloodType, Donor, Patient, Urgency};

use super::{Engine, EngineError, EngineResult};

pub struct DonorRegistry<'a> {
    engine: Engine<'a>,
}

impl<'a> DonorRegistry<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self { engine }
    }

    /// Create the donor profile of a user identity.
    ///
    /// The donor starts untyped and ineligible; only a passing lab screening
    /// sets the blood type.
    pub fn register_donor(
        &self,
        user_id: &str,
        health_status: &str,
        medical_conditions: &str,
    ) -> EngineResult<Donor> {
        let db = self.engine.db;
        if db.get_donor_by_user(user_id)?.is_some() {
            return Err(EngineError::Validation(format!(
                "user {} already has a donor profile",
                user_id
            )));
        }

        let mut donor = Donor::new(user_id.to_string(), self.engine.clock.now());
        donor.health_status = health_status.to_string();
        donor.medical_conditions = medical_conditions.to_string();
        db.insert_donor(&donor)?;

        info!(donor_id = %donor.donor_id, "donor registered");
        Ok(donor)
    }

    /// Create the patient profile of a user identity.
    pub fn register_patient(
        &self,
        user_id: &str,
        blood_type_needed: BloodType,
        urgency: Urgency,
        units_needed: u32,
        medical_condition: &str,
    ) -> EngineResult<Patient> {
        if units_needed == 0 {
            return Err(EngineError::Validation(
                "units needed must be at least 1".into(),
            ));
        }
        let db = self.engine.db;
        if db.get_patient_by_user(user_id)?.is_some() {
            return Err(EngineError::Validation(format!(
                "user {} already has a patient profile",
                user_id
            )));
        }

        let mut patient = Patient::new(
            user_id.to_string(),
            blood_type_needed,
            urgency,
            units_needed,
            self.engine.clock.now(),
        );
        patient.medical_condition = medical_condition.to_string();
        db.insert_patient(&patient)?;

        info!(patient_id = %patient.patient_id, blood_type = %blood_type_needed, "patient registered");
        Ok(patient)
    }

    /// Register a blood bank that units can be taken in at.
    pub fn register_blood_bank(&self, name: &str, hospital: &str) -> EngineResult<BloodBank> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("blood bank name is required".into()));
        }
        let bank = BloodBank::new(
            name.to_string(),
            hospital.trim().to_string(),
            self.engine.clock.now(),
        );
        self.engine.db.insert_blood_bank(&bank)?;
        info!(blood_bank_id = %bank.blood_bank_id, name, "blood bank registered");
        Ok(bank)
    }

    /// Recompute the cached eligibility flag of every donor as of `as_of`.
    ///
    /// Returns how many donors changed.
    pub fn refresh_eligibility(&self, as_of: NaiveDate) -> EngineResult<usize> {
        let evaluator = self.engine.eligibility();
        let now = self.engine.clock.now();
        let mut changed = 0;

        for mut donor in self.engine.db.list_donors()? {
            let flag = evaluator.derive_flag(&donor, as_of);
            if flag == donor.is_eligible {
                continue;
            }
            debug!(donor_id = %donor.donor_id, eligible = flag, "eligibility changed");
            donor.is_eligible = flag;
            donor.updated_at = now;
            if self.engine.db.update_donor(&donor)? {
                changed += 1;
            }
        }

        if changed > 0 {
            info!(changed, %as_of, "eligibility refreshed");
        }
        Ok(changed)
    }

    /// Recompute and persist one donor's flag.
    pub(crate) fn store_with_fresh_flag(&self, donor: &mut Donor) -> EngineResult<()> {
        let evaluator = self.engine.eligibility();
        donor.is_eligible = evaluator.derive_flag(donor, self.engine.clock.today());
        donor.updated_at = self.engine.clock.now();
        if !self.engine.db.update_donor(donor)? {
            return Err(EngineError::not_found("donor", &donor.donor_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::engine::testing::Fixture;
    use chrono::Days;

    #[test]
    fn test_register_donor_starts_ineligible() {
        let f = Fixture::new();
        let registry = f.engine().registry();

        let donor = registry.register_donor("user-1", "fit", "").unwrap();
        assert!(!donor.is_eligible);
        assert!(donor.blood_type.is_none());

        let err = registry.register_donor("user-1", "", "").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_register_patient_validates_units() {
        let f = Fixture::new();
        let registry = f.engine().registry();

        let err = registry
            .register_patient("user-2", BloodType::APositive, Urgency::Low, 0, "")
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let patient = registry
            .register_patient("user-2", BloodType::APositive, Urgency::Low, 2, "anemia")
            .unwrap();
        assert_eq!(patient.units_needed, 2);
        assert_eq!(
            f.db.get_patient_by_user("user-2").unwrap().unwrap(),
            patient
        );
    }

    #[test]
    fn test_refresh_eligibility_follows_cooldown() {
        let f = Fixture::new();
        let registry = f.engine().registry();
        let today = f.clock.today();

        let mut donor = f.eligible_donor("user-1", BloodType::OPositive);
        donor.last_donation_date = Some(today - Days::new(10));
        f.db.update_donor(&donor).unwrap();
        let untyped = registry.register_donor("user-2", "", "").unwrap();

        assert_eq!(registry.refresh_eligibility(today).unwrap(), 1);
        assert!(!f.db.get_donor(&donor.donor_id).unwrap().unwrap().is_eligible);
        assert!(!f.db.get_donor(&untyped.donor_id).unwrap().unwrap().is_eligible);

        // Nothing left to change on a second pass.
        assert_eq!(registry.refresh_eligibility(today).unwrap(), 0);

        assert_eq!(registry.refresh_eligibility(today + Days::new(46)).unwrap(), 1);
        assert!(f.db.get_donor(&donor.donor_id).unwrap().unwrap().is_eligible);
    }

    #[test]
    fn test_register_blood_bank() {
        let f = Fixture::new();
        let registry = f.engine().registry();

        let err = registry.register_blood_bank("  ", "General").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let bank = registry.register_blood_bank(" North Wing ", "General").unwrap();
        assert_eq!(bank.name, "North Wing");
        assert!(bank.is_active);
        assert_eq!(
            f.db.get_blood_bank(&bank.blood_bank_id).unwrap(),
            Some(bank)
        );
    }
}
