//! Blood Bank Core Library
//!
//! Blood matching and inventory allocation engine with a SQLite store.
//!
//! # Architecture
//!
//! ```text
//!   Patient request ──► MatchAllocator ──► CompatibilityResolver
//!                            │                     │
//!                            │            eligible donors (cached flag,
//!                            │             EligibilityEvaluator)
//!                            ▼
//!                 [donor_patient_matches]  one per (donor, request)
//!                            │
//!                 donor / patient respond ──► accepted | declined
//!
//!   Lab intake ──► collected ──► testing ──► ready ──► reserved ──► used
//!                                   │          InventoryLedger
//!                                   └──► rejected      (expired on sweep)
//! ```
//!
//! # Core Principle
//!
//! **Every status change is a compare-and-swap.** A write only lands if the
//! row is still in the status the engine checked; otherwise the caller gets a
//! retryable conflict.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence with conditional status updates
//! - [`models`]: Domain types (Donor, BloodUnit, BloodRequest, etc.)
//! - [`engine`]: Compatibility, eligibility, inventory, matching, alerts
//! - [`clock`]: Injected time source
//! - [`notify`]: Notification sink collaborator
//! - [`config`]: Engine policy configuration (TOML)
//! - [`telemetry`]: Tracing subscriber setup

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod notify;
pub mod telemetry;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CompatibilityRule, EngineConfig, StockThresholds};
pub use db::Database;
pub use engine::{
    Alert, AlertLevel, CompatibilityResolver, Dashboard, EligibilityEvaluator, Engine,
    EngineError, EngineResult, InventoryLedger, InventoryRow, MatchAllocator, Principal, Role,
    RoleStats, StockLevel, UnitIntake,
};
pub use models::{
    Appointment, AppointmentStatus, BloodBank, BloodRequest, BloodType, BloodUnit, Donor,
    DonorPatientMatch,
    FulfillmentType, LabOutcome, MatchResponse, MatchStatus, Notification, Patient,
    RequestStatus, UnitStatus, Urgency,
};
pub use notify::{MemorySink, NotificationSink, NullSink};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use models::{BloodTest, ParseEnumError, TransfusionOutcome, TransfusionReport};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum BloodBankError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rule violation: {0}")]
    RuleViolation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for BloodBankError {
    fn from(e: db::DbError) -> Self {
        BloodBankError::DatabaseError(e.to_string())
    }
}

impl From<EngineError> for BloodBankError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::Validation(_) => BloodBankError::InvalidInput(message),
            EngineError::NotFound { .. } => BloodBankError::NotFound(message),
            EngineError::InvalidTransition { .. }
            | EngineError::UnitNotReady { .. }
            | EngineError::TypeMismatch { .. }
            | EngineError::InvalidState(_) => BloodBankError::RuleViolation(message),
            EngineError::Unauthorized(_) => BloodBankError::Unauthorized(message),
            EngineError::Conflict { .. } => BloodBankError::Conflict(message),
            EngineError::Storage(_) => BloodBankError::DatabaseError(message),
        }
    }
}

impl From<ParseEnumError> for BloodBankError {
    fn from(e: ParseEnumError) -> Self {
        BloodBankError::InvalidInput(e.to_string())
    }
}

impl From<config::ConfigError> for BloodBankError {
    fn from(e: config::ConfigError) -> Self {
        BloodBankError::ConfigError(e.to_string())
    }
}

impl From<telemetry::TelemetryError> for BloodBankError {
    fn from(e: telemetry::TelemetryError) -> Self {
        BloodBankError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for BloodBankError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        BloodBankError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default policy.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<BloodBankCore>, BloodBankError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(BloodBankCore::new(db, EngineConfig::default())))
}

/// Open or create a database, reading policy from a TOML file.
#[uniffi::export]
pub fn open_database_with_config(
    path: String,
    config_path: String,
) -> Result<Arc<BloodBankCore>, BloodBankError> {
    let config = EngineConfig::load(&config_path)?;
    let db = Database::open(&path)?;
    Ok(Arc::new(BloodBankCore::new(db, config)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<BloodBankCore>, BloodBankError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(BloodBankCore::new(db, EngineConfig::default())))
}

/// Install the tracing subscriber. `filter` is an `EnvFilter` directive such
/// as `"info"` or `"bloodbank_core=debug"`; `RUST_LOG` takes precedence.
#[uniffi::export]
pub fn init_logging(filter: String) -> Result<(), BloodBankError> {
    telemetry::init(&config::TelemetryConfig { log_level: filter })?;
    Ok(())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine wrapper for FFI.
#[derive(uniffi::Object)]
pub struct BloodBankCore {
    db: Arc<Mutex<Database>>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl BloodBankCore {
    /// Wrap a database with an explicit policy and clock.
    pub fn with_clock(db: Database, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
            clock,
        }
    }

    fn new(db: Database, config: EngineConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    fn donor_record(&self, donor: Donor) -> FfiDonor {
        FfiDonor::new(donor, EligibilityEvaluator::new(self.config.cooldown_days))
    }

    /// Run `f` against an engine whose notifications go to the database.
    fn with_engine<T>(
        &self,
        f: impl FnOnce(Engine<'_>) -> EngineResult<T>,
    ) -> Result<T, BloodBankError> {
        let db = self.db.lock()?;
        let engine = Engine::new(&db, &self.config, self.clock.as_ref(), &*db);
        Ok(f(engine)?)
    }
}

#[uniffi::export]
impl BloodBankCore {
    // =========================================================================
    // Profiles
    // =========================================================================

    /// Register the donor profile of a user. The donor stays ineligible
    /// until a lab screening confirms the blood type.
    pub fn register_donor(
        &self,
        user_id: String,
        health_status: String,
        medical_conditions: String,
    ) -> Result<FfiDonor, BloodBankError> {
        let donor = self.with_engine(|e| {
            e.registry()
                .register_donor(&user_id, &health_status, &medical_conditions)
        })?;
        Ok(self.donor_record(donor))
    }

    /// Register the patient profile of a user.
    pub fn register_patient(
        &self,
        user_id: String,
        blood_type_needed: String,
        urgency: String,
        units_needed: u32,
        medical_condition: String,
    ) -> Result<FfiPatient, BloodBankError> {
        let blood_type = BloodType::from_str(&blood_type_needed)?;
        let urgency = Urgency::from_str(&urgency)?;
        let patient = self.with_engine(|e| {
            e.registry().register_patient(
                &user_id,
                blood_type,
                urgency,
                units_needed,
                &medical_condition,
            )
        })?;
        Ok(patient.into())
    }

    /// Get a donor by ID.
    pub fn get_donor(&self, donor_id: String) -> Result<Option<FfiDonor>, BloodBankError> {
        let db = self.db.lock()?;
        let donor = db.get_donor(&donor_id)?;
        Ok(donor.map(|d| self.donor_record(d)))
    }

    /// Recompute every donor's eligibility as of today. Returns how many changed.
    pub fn refresh_eligibility(&self) -> Result<u32, BloodBankError> {
        let changed =
            self.with_engine(|e| e.registry().refresh_eligibility(e.clock().today()))?;
        Ok(changed as u32)
    }

    /// Delete the donor and patient profiles of a user identity.
    pub fn purge_identity(&self, user_id: String) -> Result<u32, BloodBankError> {
        let db = self.db.lock()?;
        Ok(db.purge_identity(&user_id)? as u32)
    }

    // =========================================================================
    // Requests & Matches
    // =========================================================================

    /// Submit a blood request and match eligible donors.
    pub fn submit_request(
        &self,
        patient_id: String,
        blood_type_needed: String,
        quantity_units: u32,
        urgency: String,
    ) -> Result<FfiRequestSubmission, BloodBankError> {
        let blood_type = BloodType::from_str(&blood_type_needed)?;
        let urgency = Urgency::from_str(&urgency)?;
        let submission = self.with_engine(|e| {
            e.allocator()
                .submit_request(&patient_id, blood_type, quantity_units, urgency)
        })?;
        Ok(FfiRequestSubmission {
            request: submission.request.into(),
            matches: submission.matches.into_iter().map(|m| m.into()).collect(),
        })
    }

    pub fn approve_request(&self, request_id: String) -> Result<FfiBloodRequest, BloodBankError> {
        let request = self.with_engine(|e| e.allocator().approve_request(&request_id))?;
        Ok(request.into())
    }

    pub fn reject_request(&self, request_id: String) -> Result<FfiBloodRequest, BloodBankError> {
        let request = self.with_engine(|e| e.allocator().reject_request(&request_id))?;
        Ok(request.into())
    }

    /// Fulfill an approved request; `mode` is `donor_match` or `blood_bank`.
    pub fn fulfill_request(
        &self,
        request_id: String,
        mode: String,
    ) -> Result<FfiBloodRequest, BloodBankError> {
        let mode = FulfillmentType::from_str(&mode)?;
        let request = self.with_engine(|e| e.allocator().fulfill_request(&request_id, mode))?;
        Ok(request.into())
    }

    /// Cancel a request, its active matches and its unit reservations.
    pub fn cancel_request(&self, request_id: String) -> Result<FfiBloodRequest, BloodBankError> {
        let outcome = self.with_engine(|e| e.allocator().cancel_request(&request_id))?;
        Ok(outcome.request.into())
    }

    /// Answer a pending match as its donor or patient.
    pub fn respond_to_match(
        &self,
        user_id: String,
        role: String,
        match_id: String,
        accept: bool,
        text: String,
    ) -> Result<FfiMatch, BloodBankError> {
        let principal = Principal::new(user_id, Role::from_str(&role)?);
        let response = if accept {
            MatchResponse::accept(text)
        } else {
            MatchResponse::decline(text)
        };
        let m = self.with_engine(|e| e.allocator().respond(&principal, &match_id, response))?;
        Ok(m.into())
    }

    /// Answer a pending match with free text ("accept" anywhere accepts).
    pub fn respond_to_match_text(
        &self,
        user_id: String,
        role: String,
        match_id: String,
        text: String,
    ) -> Result<FfiMatch, BloodBankError> {
        let principal = Principal::new(user_id, Role::from_str(&role)?);
        let m = self.with_engine(|e| {
            e.allocator()
                .respond_free_text(&principal, &match_id, &text)
        })?;
        Ok(m.into())
    }

    pub fn complete_match(&self, match_id: String) -> Result<FfiMatch, BloodBankError> {
        let m = self.with_engine(|e| e.allocator().complete_match(&match_id))?;
        Ok(m.into())
    }

    pub fn cancel_match(&self, match_id: String) -> Result<FfiMatch, BloodBankError> {
        let m = self.with_engine(|e| e.allocator().cancel_match(&match_id))?;
        Ok(m.into())
    }

    /// Matches offered to a donor, newest first.
    pub fn list_matches_for_donor(&self, donor_id: String) -> Result<Vec<FfiMatch>, BloodBankError> {
        let db = self.db.lock()?;
        let matches = db.list_matches_for_donor(&donor_id)?;
        Ok(matches.into_iter().map(|m| m.into()).collect())
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// Register a blood bank units can be taken in at.
    pub fn register_blood_bank(
        &self,
        name: String,
        hospital: String,
    ) -> Result<FfiBloodBank, BloodBankError> {
        let bank = self.with_engine(|e| e.registry().register_blood_bank(&name, &hospital))?;
        Ok(bank.into())
    }

    pub fn list_blood_banks(&self, active_only: bool) -> Result<Vec<FfiBloodBank>, BloodBankError> {
        let banks = self.db.lock()?.list_blood_banks(active_only)?;
        Ok(banks.into_iter().map(|b| b.into()).collect())
    }

    /// Take a freshly collected unit into inventory. `expires_on` is
    /// `YYYY-MM-DD`; missing values fall back to the configured defaults.
    pub fn intake_unit(
        &self,
        blood_type: String,
        donor_id: Option<String>,
        blood_bank_id: Option<String>,
        expires_on: Option<String>,
        quantity_ml: Option<u32>,
    ) -> Result<FfiBloodUnit, BloodBankError> {
        let mut intake = UnitIntake::new(BloodType::from_str(&blood_type)?, self.clock.now());
        intake.donor_id = donor_id;
        intake.blood_bank_id = blood_bank_id;
        intake.expires_at = match expires_on {
            Some(date) => Some(Utc.from_utc_datetime(&parse_date(&date)?.and_time(NaiveTime::MIN))),
            None => None,
        };
        intake.quantity_ml = quantity_ml;
        let unit = self.with_engine(|e| e.ledger().intake(intake))?;
        Ok(unit.into())
    }

    pub fn begin_unit_testing(&self, unit_id: String) -> Result<FfiBloodUnit, BloodBankError> {
        let unit = self.with_engine(|e| e.lab().begin_unit_testing(&unit_id))?;
        Ok(unit.into())
    }

    /// Record the lab result of a unit under test.
    pub fn record_unit_result(
        &self,
        unit_id: String,
        technician: Option<String>,
        passed: bool,
        results: String,
    ) -> Result<FfiBloodUnit, BloodBankError> {
        let outcome = if passed {
            LabOutcome::Passed {
                blood_type: None,
                results,
            }
        } else {
            LabOutcome::Failed { results }
        };
        let (unit, _) = self.with_engine(|e| {
            e.lab()
                .record_unit_result(&unit_id, technician.as_deref(), outcome)
        })?;
        Ok(unit.into())
    }

    /// Lab results recorded against a unit, newest first.
    pub fn list_unit_tests(&self, unit_id: String) -> Result<Vec<FfiBloodTest>, BloodBankError> {
        let tests = self.with_engine(|e| e.lab().unit_history(&unit_id))?;
        Ok(tests.into_iter().map(|t| t.into()).collect())
    }

    /// Screenings of a donor, newest first.
    pub fn list_donor_tests(&self, donor_id: String) -> Result<Vec<FfiBloodTest>, BloodBankError> {
        let tests = self.with_engine(|e| e.lab().donor_history(&donor_id))?;
        Ok(tests.into_iter().map(|t| t.into()).collect())
    }

    /// Record a donor's pre-donation screening.
    pub fn screen_donor(
        &self,
        donor_id: String,
        technician: Option<String>,
        passed: bool,
        blood_type: Option<String>,
        results: String,
    ) -> Result<FfiDonor, BloodBankError> {
        let outcome = if passed {
            LabOutcome::Passed {
                blood_type: blood_type.as_deref().map(BloodType::from_str).transpose()?,
                results,
            }
        } else {
            LabOutcome::Failed { results }
        };
        let (donor, _) = self.with_engine(|e| {
            e.lab()
                .screen_donor(&donor_id, technician.as_deref(), outcome)
        })?;
        Ok(self.donor_record(donor))
    }

    pub fn reserve_unit(
        &self,
        unit_id: String,
        request_id: String,
    ) -> Result<FfiBloodUnit, BloodBankError> {
        let unit = self.with_engine(|e| e.ledger().reserve(&unit_id, &request_id))?;
        Ok(unit.into())
    }

    pub fn release_unit(&self, unit_id: String) -> Result<FfiBloodUnit, BloodBankError> {
        let unit = self.with_engine(|e| e.ledger().release(&unit_id))?;
        Ok(unit.into())
    }

    /// Log a transfusion of a reserved unit; `outcome` is `successful`,
    /// `complication` or `failed`.
    pub fn record_transfusion(
        &self,
        patient_id: String,
        unit_id: String,
        outcome: String,
        notes: String,
    ) -> Result<FfiTransfusionReport, BloodBankError> {
        let outcome = TransfusionOutcome::from_str(&outcome)?;
        let report = self.with_engine(|e| {
            e.allocator()
                .record_transfusion(&patient_id, &unit_id, outcome, &notes)
        })?;
        Ok(report.into())
    }

    /// Expire every overdue unit. Returns how many were expired.
    pub fn expire_overdue(&self) -> Result<u32, BloodBankError> {
        let expired = self.with_engine(|e| e.ledger().expire_overdue(e.clock().now()))?;
        Ok(expired.len() as u32)
    }

    /// Per-type inventory figures in blood type order.
    pub fn inventory_summary(&self) -> Result<Vec<FfiInventoryRow>, BloodBankError> {
        let rows = self.with_engine(|e| e.ledger().summary())?;
        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// [`inventory_summary`](Self::inventory_summary) for one blood bank.
    pub fn inventory_summary_for_bank(
        &self,
        blood_bank_id: String,
    ) -> Result<Vec<FfiInventoryRow>, BloodBankError> {
        let rows = self.with_engine(|e| e.ledger().summary_for_bank(&blood_bank_id))?;
        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Current alerts.
    pub fn alerts(&self) -> Result<Vec<FfiAlert>, BloodBankError> {
        let alerts = self.with_engine(|e| e.allocator().classify_alerts(e.clock().now()))?;
        Ok(alerts.into_iter().map(|a| a.into()).collect())
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    /// Book a slot; `date` is `YYYY-MM-DD`, `time` is `HH:MM`.
    pub fn schedule_appointment(
        &self,
        donor_id: String,
        date: String,
        time: String,
    ) -> Result<FfiAppointment, BloodBankError> {
        let date = parse_date(&date)?;
        let time = NaiveTime::parse_from_str(&time, "%H:%M")
            .map_err(|e| BloodBankError::InvalidInput(format!("{}: {}", time, e)))?;
        let appointment = self.with_engine(|e| e.appointments().schedule(&donor_id, date, time))?;
        Ok(appointment.into())
    }

    pub fn confirm_appointment(&self, appointment_id: String) -> Result<FfiAppointment, BloodBankError> {
        let appointment = self.with_engine(|e| e.appointments().confirm(&appointment_id))?;
        Ok(appointment.into())
    }

    pub fn cancel_appointment(&self, appointment_id: String) -> Result<FfiAppointment, BloodBankError> {
        let appointment = self.with_engine(|e| e.appointments().cancel(&appointment_id))?;
        Ok(appointment.into())
    }

    pub fn mark_no_show(&self, appointment_id: String) -> Result<FfiAppointment, BloodBankError> {
        let appointment = self.with_engine(|e| e.appointments().mark_no_show(&appointment_id))?;
        Ok(appointment.into())
    }

    /// Complete an appointment, recording the donation on the donor.
    pub fn complete_appointment(
        &self,
        appointment_id: String,
    ) -> Result<FfiAppointment, BloodBankError> {
        let (appointment, _) = self.with_engine(|e| e.appointments().complete(&appointment_id))?;
        Ok(appointment.into())
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Notifications for a user, newest first.
    pub fn list_notifications(
        &self,
        user_id: String,
        limit: u32,
    ) -> Result<Vec<FfiNotification>, BloodBankError> {
        let db = self.db.lock()?;
        let notifications = db.list_notifications(&user_id, limit as usize)?;
        Ok(notifications.into_iter().map(|n| n.into()).collect())
    }

    pub fn mark_notification_read(
        &self,
        user_id: String,
        notification_id: String,
    ) -> Result<bool, BloodBankError> {
        let db = self.db.lock()?;
        Ok(db.mark_notification_read(&user_id, &notification_id)?)
    }

    pub fn unread_notification_count(&self, user_id: String) -> Result<u32, BloodBankError> {
        let db = self.db.lock()?;
        Ok(db.unread_notification_count(&user_id)?)
    }

    // =========================================================================
    // Dashboards
    // =========================================================================

    /// Headline figures for the caller's role.
    pub fn dashboard_stats(
        &self,
        user_id: String,
        role: String,
    ) -> Result<FfiDashboardStats, BloodBankError> {
        let principal = Principal::new(user_id, Role::from_str(&role)?);
        let stats = self.with_engine(|e| e.dashboard().for_principal(&principal))?;
        Ok(stats.into())
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, BloodBankError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| BloodBankError::InvalidInput(format!("{}: {}", value, e)))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe donor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDonor {
    pub donor_id: String,
    pub user_id: String,
    pub blood_type: Option<String>,
    pub last_donation_date: Option<String>,
    pub next_eligible_date: Option<String>,
    pub is_eligible: bool,
    pub is_deferred: bool,
}

impl FfiDonor {
    fn new(donor: Donor, eligibility: EligibilityEvaluator) -> Self {
        let next = eligibility.next_eligible_date(&donor);
        Self {
            donor_id: donor.donor_id,
            user_id: donor.user_id,
            blood_type: donor.blood_type.map(|t| t.as_str().to_string()),
            last_donation_date: donor.last_donation_date.map(format_date),
            next_eligible_date: next.map(format_date),
            is_eligible: donor.is_eligible,
            is_deferred: donor.is_deferred,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub patient_id: String,
    pub user_id: String,
    pub blood_type_needed: String,
    pub urgency: String,
    pub units_needed: u32,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            patient_id: patient.patient_id,
            user_id: patient.user_id,
            blood_type_needed: patient.blood_type_needed.as_str().to_string(),
            urgency: patient.urgency.as_str().to_string(),
            units_needed: patient.units_needed,
        }
    }
}

/// FFI-safe blood request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBloodRequest {
    pub request_id: String,
    pub patient_id: String,
    pub blood_type_needed: String,
    pub quantity_units: u32,
    pub urgency: String,
    pub status: String,
    pub fulfillment_type: Option<String>,
    pub created_at: String,
}

impl From<BloodRequest> for FfiBloodRequest {
    fn from(request: BloodRequest) -> Self {
        Self {
            request_id: request.request_id,
            patient_id: request.patient_id,
            blood_type_needed: request.blood_type_needed.as_str().to_string(),
            quantity_units: request.quantity_units,
            urgency: request.urgency.as_str().to_string(),
            status: request.status.as_str().to_string(),
            fulfillment_type: request.fulfillment_type.map(|f| f.as_str().to_string()),
            created_at: request.created_at.to_rfc3339(),
        }
    }
}

/// FFI-safe donor/patient match.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMatch {
    pub match_id: String,
    pub donor_id: String,
    pub patient_id: String,
    pub request_id: String,
    pub status: String,
    pub donor_response: String,
    pub patient_response: String,
}

impl From<DonorPatientMatch> for FfiMatch {
    fn from(m: DonorPatientMatch) -> Self {
        Self {
            match_id: m.match_id,
            donor_id: m.donor_id,
            patient_id: m.patient_id,
            request_id: m.request_id,
            status: m.status.as_str().to_string(),
            donor_response: m.donor_response,
            patient_response: m.patient_response,
        }
    }
}

/// FFI-safe submission result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRequestSubmission {
    pub request: FfiBloodRequest,
    pub matches: Vec<FfiMatch>,
}

/// FFI-safe blood unit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBloodUnit {
    pub unit_id: String,
    pub blood_type: String,
    pub donor_id: Option<String>,
    pub collected_on: String,
    pub expires_on: Option<String>,
    pub quantity_ml: u32,
    pub status: String,
    pub reserved_for: Option<String>,
    pub test_results: String,
    pub blood_bank_id: Option<String>,
}

impl From<BloodUnit> for FfiBloodUnit {
    fn from(unit: BloodUnit) -> Self {
        Self {
            unit_id: unit.unit_id,
            blood_type: unit.blood_type.as_str().to_string(),
            donor_id: unit.donor_id,
            collected_on: format_date(unit.collected_at.date_naive()),
            expires_on: unit.expires_at.map(|e| format_date(e.date_naive())),
            quantity_ml: unit.quantity_ml,
            status: unit.status.as_str().to_string(),
            reserved_for: unit.reserved_for,
            test_results: unit.test_results,
            blood_bank_id: unit.blood_bank_id,
        }
    }
}

/// FFI-safe blood bank.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBloodBank {
    pub blood_bank_id: String,
    pub name: String,
    pub hospital: String,
    pub is_active: bool,
}

impl From<BloodBank> for FfiBloodBank {
    fn from(bank: BloodBank) -> Self {
        Self {
            blood_bank_id: bank.blood_bank_id,
            name: bank.name,
            hospital: bank.hospital,
            is_active: bank.is_active,
        }
    }
}

/// FFI-safe lab test.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBloodTest {
    pub test_id: String,
    pub unit_id: Option<String>,
    pub donor_id: Option<String>,
    pub test_type: String,
    pub status: String,
    pub results: String,
    pub lab_technician: Option<String>,
    pub tested_at: String,
}

impl From<BloodTest> for FfiBloodTest {
    fn from(test: BloodTest) -> Self {
        Self {
            test_id: test.test_id,
            unit_id: test.unit_id,
            donor_id: test.donor_id,
            test_type: test.test_type.as_str().to_string(),
            status: test.status.as_str().to_string(),
            results: test.results,
            lab_technician: test.lab_technician,
            tested_at: test.tested_at.to_rfc3339(),
        }
    }
}

/// FFI-safe inventory row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInventoryRow {
    pub blood_type: String,
    pub ready: u32,
    pub testing: u32,
    pub reserved: u32,
    pub used: u32,
    pub expired: u32,
    pub rejected: u32,
    pub total_active: u32,
    pub total_ml: u64,
    pub ready_ml: u64,
    pub stock_level: String,
}

impl From<InventoryRow> for FfiInventoryRow {
    fn from(row: InventoryRow) -> Self {
        Self {
            blood_type: row.blood_type.as_str().to_string(),
            ready: row.ready,
            testing: row.testing,
            reserved: row.reserved,
            used: row.used,
            expired: row.expired,
            rejected: row.rejected,
            total_active: row.total_active,
            total_ml: row.total_ml,
            ready_ml: row.ready_ml,
            stock_level: row.level.as_str().to_string(),
        }
    }
}

/// FFI-safe alert.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAlert {
    pub level: String,
    pub message: String,
    pub blood_type: Option<String>,
    pub request_id: Option<String>,
    pub patient_id: Option<String>,
    pub raised_at: String,
}

impl From<Alert> for FfiAlert {
    fn from(alert: Alert) -> Self {
        Self {
            level: alert.level.as_str().to_string(),
            message: alert.message,
            blood_type: alert.blood_type.map(|t| t.as_str().to_string()),
            request_id: alert.request_id,
            patient_id: alert.patient_id,
            raised_at: alert.raised_at.to_rfc3339(),
        }
    }
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub appointment_id: String,
    pub donor_id: String,
    pub date: String,
    pub time: String,
    pub status: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            appointment_id: appointment.appointment_id,
            donor_id: appointment.donor_id,
            date: format_date(appointment.date),
            time: appointment.time.format("%H:%M").to_string(),
            status: appointment.status.as_str().to_string(),
        }
    }
}

/// FFI-safe transfusion report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTransfusionReport {
    pub report_id: String,
    pub patient_id: String,
    pub unit_id: Option<String>,
    pub outcome: String,
    pub notes: String,
}

impl From<TransfusionReport> for FfiTransfusionReport {
    fn from(report: TransfusionReport) -> Self {
        Self {
            report_id: report.report_id,
            patient_id: report.patient_id,
            unit_id: report.unit_id,
            outcome: report.outcome.as_str().to_string(),
            notes: report.notes,
        }
    }
}

/// FFI-safe notification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNotification {
    pub notification_id: String,
    pub category: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Notification> for FfiNotification {
    fn from(n: Notification) -> Self {
        Self {
            notification_id: n.notification_id,
            category: n.category.as_str().to_string(),
            title: n.title,
            message: n.message,
            priority: n.priority.as_str().to_string(),
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Count of something per blood type.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTypeCount {
    pub blood_type: String,
    pub count: u32,
}

/// FFI-safe dashboard figures, one variant per role.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiDashboardStats {
    Donor {
        total_donations: u32,
        upcoming_appointments: u32,
        pending_matches: u32,
    },
    Patient {
        blood_requests: u32,
        active_matches: u32,
        available_units: u32,
    },
    LabTech {
        pending_tests: u32,
        today_completed: u32,
        testing_units: u32,
    },
    Admin {
        urgent_requests: u32,
        expired_units: u32,
        eligible_donors: Vec<FfiTypeCount>,
    },
}

impl From<RoleStats> for FfiDashboardStats {
    fn from(stats: RoleStats) -> Self {
        match stats {
            RoleStats::Donor(s) => FfiDashboardStats::Donor {
                total_donations: s.total_donations,
                upcoming_appointments: s.upcoming_appointments,
                pending_matches: s.pending_matches,
            },
            RoleStats::Patient(s) => FfiDashboardStats::Patient {
                blood_requests: s.blood_requests,
                active_matches: s.active_matches,
                available_units: s.available_units,
            },
            RoleStats::LabTech(s) => FfiDashboardStats::LabTech {
                pending_tests: s.pending_tests,
                today_completed: s.today_completed,
                testing_units: s.testing_units,
            },
            RoleStats::Admin(s) => FfiDashboardStats::Admin {
                urgent_requests: s.urgent_requests,
                expired_units: s.expired_units,
                eligible_donors: s
                    .eligible_donors
                    .into_iter()
                    .map(|(blood_type, count)| FfiTypeCount {
                        blood_type: blood_type.as_str().to_string(),
                        count,
                    })
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_round_trip_through_core() {
        let core = open_database_in_memory().unwrap();

        let donor = core
            .register_donor("alice".into(), String::new(), String::new())
            .unwrap();
        assert!(!donor.is_eligible);
        let donor = core
            .screen_donor(donor.donor_id, None, true, Some("O+".into()), "ok".into())
            .unwrap();
        assert!(donor.is_eligible);
        assert_eq!(donor.blood_type.as_deref(), Some("O+"));

        let patient = core
            .register_patient("bob".into(), "O+".into(), "high".into(), 1, String::new())
            .unwrap();
        let submission = core
            .submit_request(patient.patient_id, "O+".into(), 1, "high".into())
            .unwrap();
        assert_eq!(submission.matches.len(), 1);

        let m = core
            .respond_to_match_text(
                "alice".into(),
                "donor".into(),
                submission.matches[0].match_id.clone(),
                "I accept".into(),
            )
            .unwrap();
        assert_eq!(m.status, "accepted");

        // Notifications land in the database by default.
        assert!(core.unread_notification_count("alice".into()).unwrap() >= 2);
        assert_eq!(
            core.list_notifications("bob".into(), 1).unwrap()[0].title,
            "Match Response Received"
        );
    }

    #[test]
    fn test_ffi_errors_map_to_categories() {
        let core = open_database_in_memory().unwrap();

        assert!(matches!(
            core.register_patient("bob".into(), "Z+".into(), "high".into(), 1, String::new()),
            Err(BloodBankError::InvalidInput(_))
        ));
        assert!(matches!(
            core.complete_match("missing".into()),
            Err(BloodBankError::NotFound(_))
        ));
        assert!(matches!(
            core.schedule_appointment("d".into(), "2026-13-01".into(), "09:00".into()),
            Err(BloodBankError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ffi_inventory() {
        let core = open_database_in_memory().unwrap();
        let unit = core
            .intake_unit("A+".into(), None, None, None, Some(500))
            .unwrap();
        assert_eq!(unit.status, "collected");
        assert_eq!(core.list_unit_tests(unit.unit_id.clone()).unwrap().len(), 0);

        core.begin_unit_testing(unit.unit_id.clone()).unwrap();
        let unit = core
            .record_unit_result(unit.unit_id, Some("tech".into()), true, "clear".into())
            .unwrap();
        assert_eq!(unit.status, "ready");

        let summary = core.inventory_summary().unwrap();
        assert_eq!(summary.len(), 8);
        assert_eq!(summary[0].blood_type, "A+");
        assert_eq!(summary[0].ready, 1);
        assert_eq!(summary[0].stock_level, "low_stock");

        let alerts = core.alerts().unwrap();
        assert_eq!(alerts.len(), 8); // 7 critical + A+ warning
        assert_eq!(alerts[0].level, "warning");

        let tests = core.list_unit_tests(unit.unit_id).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].lab_technician.as_deref(), Some("tech"));
    }

    #[test]
    fn test_ffi_banks_and_dashboard() {
        let core = open_database_in_memory().unwrap();
        let bank = core
            .register_blood_bank("North".into(), "General".into())
            .unwrap();
        assert_eq!(core.list_blood_banks(true).unwrap().len(), 1);

        let unit = core
            .intake_unit("B-".into(), None, Some(bank.blood_bank_id.clone()), None, None)
            .unwrap();
        assert_eq!(unit.blood_bank_id.as_deref(), Some(bank.blood_bank_id.as_str()));
        core.intake_unit("B-".into(), None, None, None, None).unwrap();
        assert!(matches!(
            core.intake_unit("B-".into(), None, Some("missing".into()), None, None),
            Err(BloodBankError::NotFound(_))
        ));

        let rows = core.inventory_summary_for_bank(bank.blood_bank_id).unwrap();
        let b_neg = rows.iter().find(|r| r.blood_type == "B-").unwrap();
        assert_eq!(b_neg.total_ml, 450);

        match core.dashboard_stats("tech".into(), "lab_tech".into()).unwrap() {
            FfiDashboardStats::LabTech { pending_tests, .. } => assert_eq!(pending_tests, 2),
            other => panic!("unexpected figures: {:?}", other),
        }
        assert!(matches!(
            core.dashboard_stats("x".into(), "nurse".into()),
            Err(BloodBankError::InvalidInput(_))
        ));
    }
}
