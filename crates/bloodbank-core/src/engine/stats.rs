//! Headline figures for each role's dashboard.

use serde::{Deserialize, Serialize};

use crate::models::{BloodType, MatchStatus, TestStatus, UnitStatus, Urgency};

use super::{Engine, EngineError, EngineResult, Principal, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorStats {
    /// Units ever collected from the donor.
    pub total_donations: u32,
    /// Scheduled or confirmed appointments from today on.
    pub upcoming_appointments: u32,
    pub pending_matches: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientStats {
    pub blood_requests: u32,
    /// Pending or accepted matches.
    pub active_matches: u32,
    /// Unexpired ready units compatible with the patient's blood type.
    pub available_units: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabStats {
    /// Collected units still waiting for their lab work to start.
    pub pending_tests: u32,
    /// Tests closed today, passed or failed.
    pub today_completed: u32,
    pub testing_units: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    /// Open requests at high or emergency urgency.
    pub urgent_requests: u32,
    pub expired_units: u32,
    /// Eligible donors per blood type, in enumeration order.
    pub eligible_donors: Vec<(BloodType, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleStats {
    Donor(DonorStats),
    Patient(PatientStats),
    LabTech(LabStats),
    Admin(AdminStats),
}

pub struct Dashboard<'a> {
    engine: Engine<'a>,
}

impl<'a> Dashboard<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self { engine }
    }

    /// Figures for whatever role the caller holds.
    ///
    /// Donors and patients need a profile under their user ID.
    pub fn for_principal(&self, principal: &Principal) -> EngineResult<RoleStats> {
        let db = self.engine.db;
        match principal.role {
            Role::Donor => {
                let donor = db
                    .get_donor_by_user(&principal.user_id)?
                    .ok_or_else(|| EngineError::not_found("donor profile", &principal.user_id))?;
                Ok(RoleStats::Donor(self.donor(&donor.donor_id)?))
            }
            Role::Patient => {
                let patient = db
                    .get_patient_by_user(&principal.user_id)?
                    .ok_or_else(|| EngineError::not_found("patient profile", &principal.user_id))?;
                Ok(RoleStats::Patient(self.patient(&patient.patient_id)?))
            }
            Role::LabTech => Ok(RoleStats::LabTech(self.lab()?)),
            Role::Admin => Ok(RoleStats::Admin(self.admin()?)),
        }
    }

    pub fn donor(&self, donor_id: &str) -> EngineResult<DonorStats> {
        let db = self.engine.db;
        if db.get_donor(donor_id)?.is_none() {
            return Err(EngineError::not_found("donor", donor_id));
        }
        Ok(DonorStats {
            total_donations: db.count_units_from_donor(donor_id)?,
            upcoming_appointments: db
                .count_upcoming_appointments(donor_id, self.engine.clock.today())?,
            pending_matches: db.count_donor_matches(donor_id, &[MatchStatus::Pending])?,
        })
    }

    pub fn patient(&self, patient_id: &str) -> EngineResult<PatientStats> {
        let db = self.engine.db;
        let patient = db
            .get_patient(patient_id)?
            .ok_or_else(|| EngineError::not_found("patient", patient_id))?;
        let available = self
            .engine
            .ledger()
            .ready_units_for(patient.blood_type_needed)?
            .len();
        Ok(PatientStats {
            blood_requests: db.count_requests_for_patient(patient_id)?,
            active_matches: db.count_patient_matches(
                patient_id,
                &[MatchStatus::Pending, MatchStatus::Accepted],
            )?,
            available_units: u32::try_from(available).unwrap_or(u32::MAX),
        })
    }

    pub fn lab(&self) -> EngineResult<LabStats> {
        let db = self.engine.db;
        Ok(LabStats {
            pending_tests: db.count_units_in_status(UnitStatus::Collected)?,
            today_completed: db.count_tests_on(
                self.engine.clock.today(),
                &[TestStatus::Completed, TestStatus::Failed],
            )?,
            testing_units: db.count_units_in_status(UnitStatus::Testing)?,
        })
    }

    pub fn admin(&self) -> EngineResult<AdminStats> {
        let db = self.engine.db;
        let mut eligible_donors = Vec::with_capacity(BloodType::ALL.len());
        for blood_type in BloodType::ALL {
            eligible_donors.push((blood_type, db.count_eligible_donors(blood_type)?));
        }
        Ok(AdminStats {
            urgent_requests: db.count_open_requests(&[Urgency::High, Urgency::Emergency])?,
            expired_units: db.count_units_in_status(UnitStatus::Expired)?,
            eligible_donors,
        })
    }
}
