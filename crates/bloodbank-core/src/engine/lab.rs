//! Lab desk: donor screening and unit testing.

use tracing::info;

use crate::models::{
    BloodTest, BloodUnit, Donor, LabOutcome, Notification, NotificationCategory, Priority,
    TestType, UnitStatus,
};

use super::{Engine, EngineError, EngineResult};

pub struct LabDesk<'a> {
    engine: Engine<'a>,
}

impl<'a> LabDesk<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self { engine }
    }

    /// Record a pre-donation screening.
    ///
    /// A pass confirms the blood type and lifts any deferral; a fail defers
    /// the donor. Either way the eligibility flag is recomputed. The donor
    /// update and the test record are written together.
    pub fn screen_donor(
        &self,
        donor_id: &str,
        technician: Option<&str>,
        outcome: LabOutcome,
    ) -> EngineResult<(Donor, BloodTest)> {
        self.engine
            .atomic(|engine| engine.lab().screen_donor_inner(donor_id, technician, outcome))
    }

    fn screen_donor_inner(
        &self,
        donor_id: &str,
        technician: Option<&str>,
        outcome: LabOutcome,
    ) -> EngineResult<(Donor, BloodTest)> {
        let mut donor = self
            .engine
            .db
            .get_donor(donor_id)?
            .ok_or_else(|| EngineError::not_found("donor", donor_id))?;

        match &outcome {
            LabOutcome::Passed { blood_type, .. } => {
                let confirmed = blood_type.or(donor.blood_type).ok_or_else(|| {
                    EngineError::Validation(
                        "a passing screening of an untyped donor must report the blood type".into(),
                    )
                })?;
                donor.blood_type = Some(confirmed);
                donor.is_deferred = false;
            }
            LabOutcome::Failed { .. } => donor.is_deferred = true,
        }
        self.engine.registry().store_with_fresh_flag(&mut donor)?;

        let mut test = BloodTest::from_outcome(
            TestType::PreDonation,
            &outcome,
            technician.map(str::to_string),
            self.engine.clock.now(),
        );
        test.donor_id = Some(donor.donor_id.clone());
        self.engine.db.insert_blood_test(&test)?;

        info!(
            donor_id,
            passed = outcome.passed(),
            eligible = donor.is_eligible,
            "donor screened"
        );

        let (message, priority) = match donor.blood_type {
            Some(t) if outcome.passed() => (
                format!("Your screening passed. Blood type confirmed as {}.", t),
                Priority::Medium,
            ),
            _ => (
                "Your screening did not pass. Please contact the blood bank before donating."
                    .to_string(),
                Priority::High,
            ),
        };
        self.engine.notify(Notification::new(
            &donor.user_id,
            NotificationCategory::TestResult,
            "Blood Test Results",
            message,
            priority,
            test.tested_at,
        ));
        Ok((donor, test))
    }

    /// collected → testing.
    pub fn begin_unit_testing(&self, unit_id: &str) -> EngineResult<BloodUnit> {
        self.engine
            .ledger()
            .transition(unit_id, UnitStatus::Collected, UnitStatus::Testing)
    }

    /// Close out a unit under test: ready (or expired, if it ran out while in
    /// the lab) on a pass, rejected on a fail.
    pub fn record_unit_result(
        &self,
        unit_id: &str,
        technician: Option<&str>,
        outcome: LabOutcome,
    ) -> EngineResult<(BloodUnit, BloodTest)> {
        self.engine.atomic(|engine| {
            engine
                .lab()
                .record_unit_result_inner(unit_id, technician, outcome)
        })
    }

    fn record_unit_result_inner(
        &self,
        unit_id: &str,
        technician: Option<&str>,
        outcome: LabOutcome,
    ) -> EngineResult<(BloodUnit, BloodTest)> {
        let ledger = self.engine.ledger();
        let unit = ledger.get(unit_id)?;
        let now = self.engine.clock.now();

        let target = match &outcome {
            LabOutcome::Passed { blood_type, .. } => {
                if let Some(found) = blood_type {
                    if *found != unit.blood_type {
                        return Err(EngineError::Validation(format!(
                            "unit {} is labelled {} but tested as {}",
                            unit_id, unit.blood_type, found
                        )));
                    }
                }
                if unit.is_past_expiry(now) {
                    UnitStatus::Expired
                } else {
                    UnitStatus::Ready
                }
            }
            LabOutcome::Failed { .. } => UnitStatus::Rejected,
        };

        let mut unit = ledger.transition(unit_id, UnitStatus::Testing, target)?;
        self.engine
            .db
            .set_unit_test_results(unit_id, outcome.results(), now)?;
        unit.test_results = outcome.results().to_string();

        let mut test = BloodTest::from_outcome(
            TestType::PostCollection,
            &outcome,
            technician.map(str::to_string),
            now,
        );
        test.unit_id = Some(unit.unit_id.clone());
        test.donor_id = unit.donor_id.clone();
        self.engine.db.insert_blood_test(&test)?;

        info!(unit_id, status = %unit.status, "unit test recorded");
        Ok((unit, test))
    }

    /// Screenings of a donor, newest first.
    pub fn donor_history(&self, donor_id: &str) -> EngineResult<Vec<BloodTest>> {
        Ok(self.engine.db.list_tests_for_donor(donor_id)?)
    }

    /// Lab results recorded against a unit, newest first.
    pub fn unit_history(&self, unit_id: &str) -> EngineResult<Vec<BloodTest>> {
        Ok(self.engine.db.list_tests_for_unit(unit_id)?)
    }
}
