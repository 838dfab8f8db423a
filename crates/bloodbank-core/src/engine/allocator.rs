//! Request submission, donor matching, match responses and the request
//! lifecycle.
//!
//! ```text
//! match:   pending ──respond(accept)──► accepted ──complete──► completed
//!             │                            │
//!             ├──respond(decline)──► declined
//!             └────────cancel──────────────┴──► cancelled
//!
//! request: pending ──► approved ──► fulfilled
//!             │           │
//!             ├──► rejected
//!             └───────────┴──► cancelled
//! ```

use tracing::{debug, info};

use crate::db::ResponseColumn;
use crate::models::{
    BloodRequest, BloodType, DonorPatientMatch, FulfillmentType, MatchResponse,
    MatchStatus, Notification, NotificationCategory, Patient, Priority, RequestStatus,
    TransfusionOutcome, TransfusionReport, Urgency,
};

use super::{Engine, EngineError, EngineResult, Principal, Role};

/// A freshly submitted request and the matches created for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSubmission {
    pub request: BloodRequest,
    pub matches: Vec<DonorPatientMatch>,
}

/// What a request cancellation touched.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelledRequest {
    pub request: BloodRequest,
    pub cancelled_matches: Vec<String>,
    pub released_units: Vec<String>,
}

/// Orchestrates requests, matches and their notifications.
pub struct MatchAllocator<'a> {
    pub(super) engine: Engine<'a>,
}

impl<'a> MatchAllocator<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self { engine }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Create a pending request and immediately match eligible donors.
    ///
    /// The request and its matches are written together or not at all.
    pub fn submit_request(
        &self,
        patient_id: &str,
        blood_type_needed: BloodType,
        quantity_units: u32,
        urgency: Urgency,
    ) -> EngineResult<RequestSubmission> {
        self.engine.atomic(|engine| {
            engine
                .allocator()
                .submit_request_inner(patient_id, blood_type_needed, quantity_units, urgency)
        })
    }

    fn submit_request_inner(
        &self,
        patient_id: &str,
        blood_type_needed: BloodType,
        quantity_units: u32,
        urgency: Urgency,
    ) -> EngineResult<RequestSubmission> {
        if quantity_units == 0 {
            return Err(EngineError::Validation(
                "requested quantity must be at least 1 unit".into(),
            ));
        }
        let patient = self.patient(patient_id)?;

        let request = BloodRequest::new(
            patient.patient_id.clone(),
            blood_type_needed,
            quantity_units,
            urgency,
            self.engine.clock.now(),
        );
        self.engine.db.insert_request(&request)?;

        info!(
            request_id = %request.request_id,
            blood_type = %blood_type_needed,
            %urgency,
            "blood request submitted"
        );
        self.engine.notify(Notification::new(
            &patient.user_id,
            NotificationCategory::BloodRequest,
            "Blood Request Submitted",
            format!("Your request for {} has been submitted.", blood_type_needed),
            Priority::Medium,
            self.engine.clock.now(),
        ));

        let matches = self.find_and_create_matches(&request.request_id)?;
        Ok(RequestSubmission { request, matches })
    }

    /// Create a pending match for every eligible compatible donor not yet
    /// matched to this request. Returns only the matches created by this call.
    pub fn find_and_create_matches(&self, request_id: &str) -> EngineResult<Vec<DonorPatientMatch>> {
        self.engine
            .atomic(|engine| engine.allocator().find_and_create_matches_inner(request_id))
    }

    fn find_and_create_matches_inner(
        &self,
        request_id: &str,
    ) -> EngineResult<Vec<DonorPatientMatch>> {
        let request = self.request(request_id)?;
        if !request.status.is_open() {
            return Err(EngineError::InvalidState(format!(
                "request {} is {}",
                request_id, request.status
            )));
        }

        let types: Vec<BloodType> = self
            .engine
            .resolver()
            .compatible_donor_types(request.blood_type_needed)
            .into_iter()
            .collect();
        let donors = self.engine.db.list_eligible_donors(&types)?;

        let priority = if request.urgency >= Urgency::High {
            Priority::High
        } else {
            Priority::Medium
        };

        let mut created = Vec::new();
        for donor in donors {
            let m = DonorPatientMatch::new(
                donor.donor_id.clone(),
                request.patient_id.clone(),
                request.request_id.clone(),
                self.engine.clock.now(),
            );
            if !self.engine.db.insert_match_if_absent(&m)? {
                debug!(donor_id = %donor.donor_id, request_id, "donor already matched, skipped");
                continue;
            }

            debug!(match_id = %m.match_id, donor_id = %donor.donor_id, "match created");
            self.engine.notify(Notification::new(
                &donor.user_id,
                NotificationCategory::DonorMatch,
                "New Match Request",
                format!(
                    "A patient needs {} blood ({} urgency). Please respond to the match request.",
                    request.blood_type_needed, request.urgency
                ),
                priority,
                self.engine.clock.now(),
            ));
            created.push(m);
        }

        info!(request_id, created = created.len(), "donor matching finished");
        Ok(created)
    }

    pub fn approve_request(&self, request_id: &str) -> EngineResult<BloodRequest> {
        self.move_request(request_id, RequestStatus::Approved, None)
    }

    pub fn reject_request(&self, request_id: &str) -> EngineResult<BloodRequest> {
        self.move_request(request_id, RequestStatus::Rejected, None)
    }

    /// Mark an approved request as fulfilled through `mode`.
    pub fn fulfill_request(
        &self,
        request_id: &str,
        mode: FulfillmentType,
    ) -> EngineResult<BloodRequest> {
        self.move_request(request_id, RequestStatus::Fulfilled, Some(mode))
    }

    /// Cancel an open request, its active matches, and its reservations,
    /// all in one transaction.
    pub fn cancel_request(&self, request_id: &str) -> EngineResult<CancelledRequest> {
        self.engine
            .atomic(|engine| engine.allocator().cancel_request_inner(request_id))
    }

    fn cancel_request_inner(&self, request_id: &str) -> EngineResult<CancelledRequest> {
        let request = self.move_request(request_id, RequestStatus::Cancelled, None)?;
        let now = self.engine.clock.now();

        let mut cancelled_matches = Vec::new();
        for m in self.engine.db.list_matches_for_request(request_id)? {
            if !m.status.is_active() {
                continue;
            }
            if !self
                .engine
                .db
                .update_match_status(&m.match_id, m.status, MatchStatus::Cancelled, now)?
            {
                debug!(match_id = %m.match_id, "match moved concurrently, left as is");
                continue;
            }
            if let Some(donor) = self.engine.db.get_donor(&m.donor_id)? {
                self.engine.notify(Notification::new(
                    &donor.user_id,
                    NotificationCategory::DonorMatch,
                    "Match Cancelled",
                    "The blood request you were matched to has been cancelled.",
                    Priority::Medium,
                    now,
                ));
            }
            cancelled_matches.push(m.match_id);
        }

        let ledger = self.engine.ledger();
        let mut released_units = Vec::new();
        for unit in self.engine.db.list_units_reserved_for(request_id)? {
            ledger.release(&unit.unit_id)?;
            released_units.push(unit.unit_id);
        }

        info!(
            request_id,
            matches = cancelled_matches.len(),
            units = released_units.len(),
            "request cancelled"
        );
        Ok(CancelledRequest {
            request,
            cancelled_matches,
            released_units,
        })
    }

    fn move_request(
        &self,
        request_id: &str,
        target: RequestStatus,
        fulfillment: Option<FulfillmentType>,
    ) -> EngineResult<BloodRequest> {
        let mut request = self.request(request_id)?;
        if !request.status.can_transition_to(target) {
            return Err(EngineError::InvalidTransition {
                entity: "request",
                id: request_id.to_string(),
                from: request.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = self.engine.clock.now();
        if !self.engine.db.update_request_status(
            request_id,
            request.status,
            target,
            fulfillment,
            now,
        )? {
            return Err(EngineError::conflict("request", request_id));
        }

        info!(request_id, from = %request.status, to = %target, "request status changed");
        request.status = target;
        request.fulfillment_type = fulfillment.or(request.fulfillment_type);
        request.updated_at = now;

        let patient = self.patient(&request.patient_id)?;
        self.engine.notify(Notification::new(
            &patient.user_id,
            NotificationCategory::BloodRequest,
            "Request Status Updated",
            format!("Your request is now '{}'.", target),
            Priority::Medium,
            now,
        ));
        Ok(request)
    }

    // =========================================================================
    // Matches
    // =========================================================================

    /// Record the donor's or the patient's answer to a pending match.
    ///
    /// The caller must be the donor or the patient of this match, acting in
    /// that role. A match is answered exactly once.
    pub fn respond(
        &self,
        principal: &Principal,
        match_id: &str,
        response: MatchResponse,
    ) -> EngineResult<DonorPatientMatch> {
        let mut m = self.get_match(match_id)?;
        let donor_user = self
            .engine
            .db
            .get_donor(&m.donor_id)?
            .ok_or_else(|| EngineError::not_found("donor", &m.donor_id))?
            .user_id;
        let patient_user = self.patient(&m.patient_id)?.user_id;

        let (column, counterpart) = match principal.role {
            Role::Donor if principal.user_id == donor_user => (ResponseColumn::Donor, patient_user),
            Role::Patient if principal.user_id == patient_user => {
                (ResponseColumn::Patient, donor_user)
            }
            _ => {
                return Err(EngineError::Unauthorized(format!(
                    "{} {} is not a party to match {}",
                    principal.role.as_str(),
                    principal.user_id,
                    match_id
                )))
            }
        };

        if m.status != MatchStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "match {} is already {}",
                match_id, m.status
            )));
        }

        let target = response.target_status();
        let now = self.engine.clock.now();
        if !self.engine.db.record_match_response(
            match_id,
            MatchStatus::Pending,
            target,
            column,
            &response.text,
            now,
        )? {
            return Err(EngineError::conflict("match", match_id));
        }

        info!(match_id, role = principal.role.as_str(), status = %target, "match responded");
        match column {
            ResponseColumn::Donor => m.donor_response = response.text,
            ResponseColumn::Patient => m.patient_response = response.text,
        }
        m.status = target;
        m.updated_at = now;

        let side = match column {
            ResponseColumn::Donor => "donor",
            ResponseColumn::Patient => "patient",
        };
        self.engine.notify(Notification::new(
            &counterpart,
            NotificationCategory::DonorMatch,
            "Match Response Received",
            format!("The {} has {} the match.", side, target),
            Priority::Medium,
            now,
        ));
        Ok(m)
    }

    /// Free-text form of [`respond`](Self::respond): any text containing
    /// "accept" accepts, anything else declines.
    pub fn respond_free_text(
        &self,
        principal: &Principal,
        match_id: &str,
        text: &str,
    ) -> EngineResult<DonorPatientMatch> {
        self.respond(principal, match_id, MatchResponse::from_free_text(text))
    }

    /// accepted → completed. Consuming a unit from the donor is a separate
    /// call the host makes once the unit exists.
    pub fn complete_match(&self, match_id: &str) -> EngineResult<DonorPatientMatch> {
        self.move_match(match_id, &[MatchStatus::Accepted], MatchStatus::Completed)
    }

    /// pending | accepted → cancelled; the donor is told.
    pub fn cancel_match(&self, match_id: &str) -> EngineResult<DonorPatientMatch> {
        let m = self.move_match(
            match_id,
            &[MatchStatus::Pending, MatchStatus::Accepted],
            MatchStatus::Cancelled,
        )?;
        if let Some(donor) = self.engine.db.get_donor(&m.donor_id)? {
            self.engine.notify(Notification::new(
                &donor.user_id,
                NotificationCategory::DonorMatch,
                "Match Cancelled",
                "A match you were part of has been cancelled.",
                Priority::Medium,
                m.updated_at,
            ));
        }
        Ok(m)
    }

    fn move_match(
        &self,
        match_id: &str,
        allowed_from: &[MatchStatus],
        target: MatchStatus,
    ) -> EngineResult<DonorPatientMatch> {
        let mut m = self.get_match(match_id)?;
        if !allowed_from.contains(&m.status) {
            return Err(EngineError::InvalidState(format!(
                "match {} is {}, cannot become {}",
                match_id, m.status, target
            )));
        }

        let now = self.engine.clock.now();
        if !self
            .engine
            .db
            .update_match_status(match_id, m.status, target, now)?
        {
            return Err(EngineError::conflict("match", match_id));
        }

        info!(match_id, from = %m.status, to = %target, "match status changed");
        m.status = target;
        m.updated_at = now;
        Ok(m)
    }

    // =========================================================================
    // Transfusions
    // =========================================================================

    /// Consume a unit reserved for one of the patient's requests and log
    /// the outcome.
    ///
    /// The unit must be compatible with the patient's own blood type. The
    /// status change and the report are written in one transaction.
    pub fn record_transfusion(
        &self,
        patient_id: &str,
        unit_id: &str,
        outcome: TransfusionOutcome,
        notes: &str,
    ) -> EngineResult<TransfusionReport> {
        self.engine.atomic(|engine| {
            engine
                .allocator()
                .record_transfusion_inner(patient_id, unit_id, outcome, notes)
        })
    }

    fn record_transfusion_inner(
        &self,
        patient_id: &str,
        unit_id: &str,
        outcome: TransfusionOutcome,
        notes: &str,
    ) -> EngineResult<TransfusionReport> {
        let patient = self.patient(patient_id)?;
        let ledger = self.engine.ledger();
        let unit = ledger.get(unit_id)?;

        let request_id = unit.reserved_for.as_deref().ok_or_else(|| {
            EngineError::InvalidState(format!(
                "unit {} is {} and not reserved for any request",
                unit_id, unit.status
            ))
        })?;
        if self.request(request_id)?.patient_id != patient.patient_id {
            return Err(EngineError::Validation(format!(
                "unit {} is reserved for another patient",
                unit_id
            )));
        }
        if !self
            .engine
            .resolver()
            .can_satisfy(unit.blood_type, patient.blood_type_needed)
        {
            return Err(EngineError::TypeMismatch {
                unit_id: unit.unit_id,
                unit_type: unit.blood_type.to_string(),
                needed: patient.blood_type_needed.to_string(),
            });
        }

        let unit = ledger.consume(unit_id)?;
        let report = TransfusionReport {
            report_id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient.patient_id.clone(),
            unit_id: Some(unit.unit_id.clone()),
            outcome,
            notes: notes.to_string(),
            created_at: self.engine.clock.now(),
        };
        self.engine.db.insert_transfusion_report(&report)?;
        info!(report_id = %report.report_id, unit_id, outcome = outcome.as_str(), "transfusion recorded");

        self.engine.notify(Notification::new(
            &patient.user_id,
            NotificationCategory::System,
            "Transfusion Report Logged",
            "A transfusion report was recorded for your case.",
            Priority::High,
            report.created_at,
        ));
        if let Some(donor_id) = unit.donor_id.as_deref() {
            if let Some(donor) = self.engine.db.get_donor(donor_id)? {
                self.engine.notify(Notification::new(
                    &donor.user_id,
                    NotificationCategory::System,
                    "Your Donation Helped a Patient",
                    "Thank you! Your donated blood was successfully used to help a patient.",
                    Priority::High,
                    report.created_at,
                ));
            }
        }
        Ok(report)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn request(&self, request_id: &str) -> EngineResult<BloodRequest> {
        self.engine
            .db
            .get_request(request_id)?
            .ok_or_else(|| EngineError::not_found("request", request_id))
    }

    fn patient(&self, patient_id: &str) -> EngineResult<Patient> {
        self.engine
            .db
            .get_patient(patient_id)?
            .ok_or_else(|| EngineError::not_found("patient", patient_id))
    }

    fn get_match(&self, match_id: &str) -> EngineResult<DonorPatientMatch> {
        self.engine
            .db
            .get_match(match_id)?
            .ok_or_else(|| EngineError::not_found("match", match_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{t0, Fixture};
    use crate::models::{BloodUnit, Donor, UnitStatus};

    #[test]
    fn test_submit_matches_eligible_donors_only() {
        let f = Fixture::new();
        let alice = f.eligible_donor("alice", BloodType::OPositive);
        f.eligible_donor("carol", BloodType::ONegative);
        let mut dave = Donor::new("dave".into(), t0());
        dave.blood_type = Some(BloodType::OPositive);
        f.db.insert_donor(&dave).unwrap();
        let bob = f.patient("bob", BloodType::OPositive, Urgency::High);

        let submission = f
            .engine()
            .allocator()
            .submit_request(&bob.patient_id, BloodType::OPositive, 1, Urgency::High)
            .unwrap();

        assert_eq!(submission.request.status, RequestStatus::Pending);
        assert_eq!(submission.matches.len(), 1);
        assert_eq!(submission.matches[0].donor_id, alice.donor_id);

        let invites = f.sink.sent_to("alice");
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0].title, "New Match Request");
        assert_eq!(invites[0].priority, Priority::High);
        assert_eq!(f.sink.sent_to("bob")[0].title, "Blood Request Submitted");
    }

    #[test]
    fn test_rematching_creates_nothing_new() {
        let f = Fixture::new();
        f.eligible_donor("alice", BloodType::APositive);
        let bob = f.patient("bob", BloodType::APositive, Urgency::Low);
        let allocator = f.engine().allocator();

        let submission = allocator
            .submit_request(&bob.patient_id, BloodType::APositive, 1, Urgency::Low)
            .unwrap();
        assert_eq!(submission.matches.len(), 1);
        assert!(allocator
            .find_and_create_matches(&submission.request.request_id)
            .unwrap()
            .is_empty());

        f.eligible_donor("erin", BloodType::APositive);
        assert_eq!(
            allocator
                .find_and_create_matches(&submission.request.request_id)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_submit_validates_input() {
        let f = Fixture::new();
        let bob = f.patient("bob", BloodType::APositive, Urgency::Low);
        let allocator = f.engine().allocator();

        let err = allocator
            .submit_request(&bob.patient_id, BloodType::APositive, 0, Urgency::Low)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = allocator
            .submit_request("nobody", BloodType::APositive, 1, Urgency::Low)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_respond_authorization_and_one_shot() {
        let f = Fixture::new();
        f.eligible_donor("alice", BloodType::OPositive);
        let bob = f.patient("bob", BloodType::OPositive, Urgency::High);
        let allocator = f.engine().allocator();
        let submission = allocator
            .submit_request(&bob.patient_id, BloodType::OPositive, 1, Urgency::High)
            .unwrap();
        let match_id = &submission.matches[0].match_id;

        // Wrong role for the identity, and a stranger.
        for principal in [
            Principal::new("alice", Role::Patient),
            Principal::new("mallory", Role::Donor),
            Principal::new("alice", Role::Admin),
        ] {
            let err = allocator
                .respond(&principal, match_id, MatchResponse::accept(""))
                .unwrap_err();
            assert!(matches!(err, EngineError::Unauthorized(_)));
        }

        let m = allocator
            .respond_free_text(&Principal::new("alice", Role::Donor), match_id, "I accept")
            .unwrap();
        assert_eq!(m.status, MatchStatus::Accepted);
        assert_eq!(m.donor_response, "I accept");
        assert_eq!(f.sink.sent_to("bob").last().unwrap().title, "Match Response Received");

        let err = allocator
            .respond(
                &Principal::new("bob", Role::Patient),
                match_id,
                MatchResponse::decline("no"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn test_complete_requires_accepted() {
        let f = Fixture::new();
        f.eligible_donor("alice", BloodType::OPositive);
        let bob = f.patient("bob", BloodType::OPositive, Urgency::High);
        let allocator = f.engine().allocator();
        let submission = allocator
            .submit_request(&bob.patient_id, BloodType::OPositive, 1, Urgency::High)
            .unwrap();
        let match_id = &submission.matches[0].match_id;

        let err = allocator.complete_match(match_id).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        allocator
            .respond(&Principal::new("bob", Role::Patient), match_id, MatchResponse::accept("yes"))
            .unwrap();
        let m = allocator.complete_match(match_id).unwrap();
        assert_eq!(m.status, MatchStatus::Completed);

        assert!(matches!(
            allocator.cancel_match(match_id),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_request_lifecycle() {
        let f = Fixture::new();
        let bob = f.patient("bob", BloodType::BPositive, Urgency::Medium);
        let allocator = f.engine().allocator();
        let request_id = allocator
            .submit_request(&bob.patient_id, BloodType::BPositive, 2, Urgency::Medium)
            .unwrap()
            .request
            .request_id;

        let err = allocator
            .fulfill_request(&request_id, FulfillmentType::BloodBank)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        allocator.approve_request(&request_id).unwrap();
        let fulfilled = allocator
            .fulfill_request(&request_id, FulfillmentType::BloodBank)
            .unwrap();
        assert_eq!(fulfilled.status, RequestStatus::Fulfilled);
        assert_eq!(fulfilled.fulfillment_type, Some(FulfillmentType::BloodBank));

        assert!(matches!(
            allocator.cancel_request(&request_id),
            Err(EngineError::InvalidTransition { .. })
        ));
        let updates = f
            .sink
            .sent_to("bob")
            .into_iter()
            .filter(|n| n.title == "Request Status Updated")
            .count();
        assert_eq!(updates, 2);
    }

    #[test]
    fn test_cancel_request_cascades() {
        let f = Fixture::new();
        f.eligible_donor("alice", BloodType::APositive);
        f.eligible_donor("carol", BloodType::APositive);
        let bob = f.patient("bob", BloodType::APositive, Urgency::High);
        let engine = f.engine();
        let allocator = engine.allocator();

        let submission = allocator
            .submit_request(&bob.patient_id, BloodType::APositive, 1, Urgency::High)
            .unwrap();
        let request_id = submission.request.request_id.clone();
        let declined = &submission.matches[1];
        allocator
            .respond(&Principal::new("bob", Role::Patient), &declined.match_id, MatchResponse::decline("no"))
            .unwrap();

        let mut unit = BloodUnit::new(BloodType::APositive, None, t0(), None, 450, t0());
        unit.status = UnitStatus::Ready;
        f.db.insert_unit(&unit).unwrap();
        engine.ledger().reserve(&unit.unit_id, &request_id).unwrap();

        let outcome = allocator.cancel_request(&request_id).unwrap();
        assert_eq!(outcome.request.status, RequestStatus::Cancelled);
        assert_eq!(outcome.cancelled_matches, vec![submission.matches[0].match_id.clone()]);
        assert_eq!(outcome.released_units, vec![unit.unit_id.clone()]);

        assert_eq!(
            f.db.get_match(&declined.match_id).unwrap().unwrap().status,
            MatchStatus::Declined
        );
        let stored = f.db.get_unit(&unit.unit_id).unwrap().unwrap();
        assert_eq!(stored.status, UnitStatus::Ready);
        assert!(stored.reserved_for.is_none());

        assert!(matches!(
            allocator.find_and_create_matches(&request_id),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_cancel_request_is_all_or_nothing() {
        let f = Fixture::new();
        f.eligible_donor("alice", BloodType::APositive);
        let bob = f.patient("bob", BloodType::APositive, Urgency::Medium);
        let engine = f.engine();
        let submission = engine
            .allocator()
            .submit_request(&bob.patient_id, BloodType::APositive, 1, Urgency::Medium)
            .unwrap();
        let request_id = submission.request.request_id.clone();
        let mut unit = BloodUnit::new(BloodType::APositive, None, t0(), None, 450, t0());
        unit.status = UnitStatus::Ready;
        f.db.insert_unit(&unit).unwrap();
        engine.ledger().reserve(&unit.unit_id, &request_id).unwrap();
        let delivered = f.sink.sent().len();

        // The last step, releasing the unit, fails.
        f.db.conn()
            .execute_batch(
                "CREATE TRIGGER pin_units BEFORE UPDATE ON blood_units
                 BEGIN SELECT RAISE(ABORT, 'units are pinned'); END;",
            )
            .unwrap();
        let err = engine.allocator().cancel_request(&request_id).unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));

        assert_eq!(
            f.db.get_request(&request_id).unwrap().unwrap().status,
            RequestStatus::Pending
        );
        assert_eq!(
            f.db.get_match(&submission.matches[0].match_id).unwrap().unwrap().status,
            MatchStatus::Pending
        );
        assert_eq!(
            f.db.get_unit(&unit.unit_id).unwrap().unwrap().status,
            UnitStatus::Reserved
        );
        assert_eq!(f.sink.sent().len(), delivered);
    }

    #[test]
    fn test_record_transfusion() {
        let f = Fixture::new();
        let alice = f.eligible_donor("alice", BloodType::OPositive);
        let bob = f.patient("bob", BloodType::OPositive, Urgency::High);
        let engine = f.engine();
        let allocator = engine.allocator();
        let request_id = allocator
            .submit_request(&bob.patient_id, BloodType::OPositive, 1, Urgency::High)
            .unwrap()
            .request
            .request_id;

        let mut unit = BloodUnit::new(BloodType::OPositive, Some(alice.donor_id.clone()), t0(), None, 450, t0());
        unit.status = UnitStatus::Ready;
        f.db.insert_unit(&unit).unwrap();

        // Not reserved yet
        let err = allocator
            .record_transfusion(&bob.patient_id, &unit.unit_id, TransfusionOutcome::Successful, "")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert!(f.db.list_transfusions_for_patient(&bob.patient_id).unwrap().is_empty());

        engine.ledger().reserve(&unit.unit_id, &request_id).unwrap();
        let report = allocator
            .record_transfusion(&bob.patient_id, &unit.unit_id, TransfusionOutcome::Successful, "ok")
            .unwrap();
        assert_eq!(report.unit_id.as_deref(), Some(unit.unit_id.as_str()));
        assert_eq!(
            f.db.get_unit(&unit.unit_id).unwrap().unwrap().status,
            UnitStatus::Used
        );
        assert!(f
            .sink
            .sent_to("alice")
            .iter()
            .any(|n| n.title == "Your Donation Helped a Patient"));
        assert!(f
            .sink
            .sent_to("bob")
            .iter()
            .any(|n| n.title == "Transfusion Report Logged"));
    }

    #[test]
    fn test_transfusion_refuses_incompatible_reserved_unit() {
        // A+ patient whose request asked for O+: the reservation is valid for
        // the request, but the unit does not fit the patient.
        let f = Fixture::new();
        let bob = f.patient("bob", BloodType::APositive, Urgency::High);
        let engine = f.engine();
        let request_id = engine
            .allocator()
            .submit_request(&bob.patient_id, BloodType::OPositive, 1, Urgency::High)
            .unwrap()
            .request
            .request_id;

        let mut unit = BloodUnit::new(BloodType::OPositive, None, t0(), None, 450, t0());
        unit.status = UnitStatus::Ready;
        f.db.insert_unit(&unit).unwrap();
        engine.ledger().reserve(&unit.unit_id, &request_id).unwrap();

        let err = engine
            .allocator()
            .record_transfusion(&bob.patient_id, &unit.unit_id, TransfusionOutcome::Successful, "")
            .unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
        assert_eq!(
            f.db.get_unit(&unit.unit_id).unwrap().unwrap().status,
            UnitStatus::Reserved
        );
        assert!(f.db.list_transfusions_for_patient(&bob.patient_id).unwrap().is_empty());
    }

    #[test]
    fn test_transfusion_rolls_back_when_report_cannot_be_written() {
        let f = Fixture::new();
        let alice = f.eligible_donor("alice", BloodType::OPositive);
        let bob = f.patient("bob", BloodType::OPositive, Urgency::High);
        let engine = f.engine();
        let request_id = engine
            .allocator()
            .submit_request(&bob.patient_id, BloodType::OPositive, 1, Urgency::High)
            .unwrap()
            .request
            .request_id;
        let mut unit = BloodUnit::new(BloodType::OPositive, Some(alice.donor_id), t0(), None, 450, t0());
        unit.status = UnitStatus::Ready;
        f.db.insert_unit(&unit).unwrap();
        engine.ledger().reserve(&unit.unit_id, &request_id).unwrap();
        let delivered = f.sink.sent().len();

        f.db.conn()
            .execute_batch(
                "CREATE TRIGGER refuse_reports BEFORE INSERT ON transfusion_reports
                 BEGIN SELECT RAISE(ABORT, 'reports are read-only'); END;",
            )
            .unwrap();
        let err = engine
            .allocator()
            .record_transfusion(&bob.patient_id, &unit.unit_id, TransfusionOutcome::Successful, "")
            .unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(f.db.conn().is_autocommit());

        let stored = f.db.get_unit(&unit.unit_id).unwrap().unwrap();
        assert_eq!(stored.status, UnitStatus::Reserved);
        assert_eq!(stored.reserved_for.as_deref(), Some(request_id.as_str()));
        assert_eq!(f.sink.sent().len(), delivered);

        f.db.conn().execute_batch("DROP TRIGGER refuse_reports;").unwrap();
        engine
            .allocator()
            .record_transfusion(&bob.patient_id, &unit.unit_id, TransfusionOutcome::Successful, "")
            .unwrap();
        assert_eq!(
            f.db.get_unit(&unit.unit_id).unwrap().unwrap().status,
            UnitStatus::Used
        );
    }
}
