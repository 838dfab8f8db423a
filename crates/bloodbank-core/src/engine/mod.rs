//! Blood matching and inventory allocation engine.
//!
//! Pipeline: Request → Compatibility → Eligible donors → Matches → Responses
//!
//! [`Engine`] bundles the collaborators (store, policy, clock, notification
//! sink) and hands out the components that operate over them.

mod alerts;
mod allocator;
mod appointments;
mod compatibility;
mod eligibility;
mod inventory;
mod lab;
mod registry;
mod stats;

pub use alerts::*;
pub use allocator::*;
pub use appointments::*;
pub use compatibility::*;
pub use eligibility::*;
pub use inventory::*;
pub use lab::*;
pub use registry::*;
pub use stats::*;

use std::cell::RefCell;

use thiserror::Error;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::db::{Database, DbError};
use crate::models::Notification;
use crate::notify::NotificationSink;

/// Engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid {entity} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("Unit {unit_id} is not ready (status: {status})")]
    UnitNotReady { unit_id: String, status: String },

    #[error("Unit {unit_id} of type {unit_type} cannot satisfy a request for {needed}")]
    TypeMismatch {
        unit_id: String,
        unit_type: String,
        needed: String,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

impl EngineError {
    /// Whether re-reading and retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. } | EngineError::Storage(_))
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, id: &str) -> Self {
        tracing::warn!(entity, id, "compare-and-swap lost to a concurrent writer");
        EngineError::Conflict {
            entity,
            id: id.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Role supplied by the identity layer. The engine trusts it as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Donor,
    Patient,
    LabTech,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Patient => "patient",
            Role::LabTech => "lab_tech",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::models::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(Role::Donor),
            "patient" => Ok(Role::Patient),
            "lab_tech" => Ok(Role::LabTech),
            "admin" => Ok(Role::Admin),
            _ => Err(crate::models::ParseEnumError::new("role", s)),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Collaborators shared by every engine component.
#[derive(Clone, Copy)]
pub struct Engine<'a> {
    db: &'a Database,
    config: &'a EngineConfig,
    clock: &'a dyn Clock,
    sink: &'a dyn NotificationSink,
    /// Notifications held back until the open transaction commits.
    outbox: Option<&'a RefCell<Vec<Notification>>>,
}

impl<'a> Engine<'a> {
    pub fn new(
        db: &'a Database,
        config: &'a EngineConfig,
        clock: &'a dyn Clock,
        sink: &'a dyn NotificationSink,
    ) -> Self {
        Self {
            db,
            config,
            clock,
            sink,
            outbox: None,
        }
    }

    pub fn resolver(&self) -> CompatibilityResolver {
        CompatibilityResolver::from_rule(self.config.compatibility)
    }

    pub fn eligibility(&self) -> EligibilityEvaluator {
        EligibilityEvaluator::new(self.config.cooldown_days)
    }

    pub fn ledger(&self) -> InventoryLedger<'a> {
        InventoryLedger::new(*self)
    }

    pub fn allocator(&self) -> MatchAllocator<'a> {
        MatchAllocator::new(*self)
    }

    pub fn appointments(&self) -> AppointmentBook<'a> {
        AppointmentBook::new(*self)
    }

    pub fn lab(&self) -> LabDesk<'a> {
        LabDesk::new(*self)
    }

    pub fn registry(&self) -> DonorRegistry<'a> {
        DonorRegistry::new(*self)
    }

    pub fn dashboard(&self) -> Dashboard<'a> {
        Dashboard::new(*self)
    }

    pub fn db(&self) -> &'a Database {
        self.db
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    pub(crate) fn notify(&self, notification: Notification) {
        match self.outbox {
            Some(outbox) => outbox.borrow_mut().push(notification),
            None => crate::notify::dispatch(self.sink, notification),
        }
    }

    /// Run a multi-write operation as one transaction.
    ///
    /// Notifications raised inside `f` are delivered only after commit and
    /// are dropped on rollback. Nested calls join the outer transaction.
    pub(crate) fn atomic<T>(
        &self,
        f: impl FnOnce(Engine<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if self.outbox.is_some() {
            return f(*self);
        }
        let outbox = RefCell::new(Vec::new());
        let scoped = Engine {
            db: self.db,
            config: self.config,
            clock: self.clock,
            sink: self.sink,
            outbox: Some(&outbox),
        };
        let value = self.db.atomically(|| f(scoped))?;
        for notification in outbox.into_inner() {
            crate::notify::dispatch(self.sink, notification);
        }
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for engine tests.

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::models::{BloodType, Donor, Patient, Urgency};
    use crate::notify::MemorySink;

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    pub(crate) struct Fixture {
        pub db: Database,
        pub config: EngineConfig,
        pub clock: FixedClock,
        pub sink: MemorySink,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_config(EngineConfig::default())
        }

        pub fn with_config(config: EngineConfig) -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
                config,
                clock: FixedClock::new(t0()),
                sink: MemorySink::new(),
            }
        }

        pub fn engine(&self) -> Engine<'_> {
            Engine::new(&self.db, &self.config, &self.clock, &self.sink)
        }

        pub fn eligible_donor(&self, user_id: &str, blood_type: BloodType) -> Donor {
            let mut donor = Donor::new(user_id.into(), self.clock.now());
            donor.blood_type = Some(blood_type);
            donor.is_eligible = true;
            self.db.insert_donor(&donor).unwrap();
            donor
        }

        pub fn patient(&self, user_id: &str, blood_type: BloodType, urgency: Urgency) -> Patient {
            let patient = Patient::new(user_id.into(), blood_type, urgency, 1, self.clock.now());
            self.db.insert_patient(&patient).unwrap();
            patient
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::Conflict {
            entity: "unit",
            id: "u".into()
        }
        .is_retryable());
        assert!(EngineError::Storage(DbError::NotFound("x".into())).is_retryable());
        assert!(!EngineError::Unauthorized("nope".into()).is_retryable());
        assert!(!EngineError::Validation("bad".into()).is_retryable());
    }
}
