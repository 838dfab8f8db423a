//! Blood unit inventory models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blood::BloodType;
use super::ParseEnumError;

/// Lifecycle status of a blood unit.
///
/// ```text
/// collected ──► testing ──► ready ──► reserved ──► used
///     │            │          │  ◄──────┘ (release)
///     │            └──► rejected
///     └──► rejected
/// collected | testing | ready | reserved ──► expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Collected,
    Testing,
    Ready,
    Reserved,
    Used,
    Expired,
    Rejected,
}

impl UnitStatus {
    pub const ALL: [UnitStatus; 7] = [
        UnitStatus::Collected,
        UnitStatus::Testing,
        UnitStatus::Ready,
        UnitStatus::Reserved,
        UnitStatus::Used,
        UnitStatus::Expired,
        UnitStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Collected => "collected",
            UnitStatus::Testing => "testing",
            UnitStatus::Ready => "ready",
            UnitStatus::Reserved => "reserved",
            UnitStatus::Used => "used",
            UnitStatus::Expired => "expired",
            UnitStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitStatus::Used | UnitStatus::Expired | UnitStatus::Rejected
        )
    }

    /// Statuses an expiry sweep may move to `expired`.
    pub fn is_expirable(&self) -> bool {
        matches!(
            self,
            UnitStatus::Collected | UnitStatus::Testing | UnitStatus::Ready | UnitStatus::Reserved
        )
    }

    /// Whether `self -> target` is an edge of the lifecycle graph.
    pub fn can_transition_to(&self, target: UnitStatus) -> bool {
        use UnitStatus::*;
        match (self, target) {
            (Collected, Testing) | (Collected, Rejected) => true,
            (Testing, Ready) | (Testing, Rejected) => true,
            (Ready, Reserved) => true,
            (Reserved, Used) | (Reserved, Ready) => true,
            (from, Expired) => from.is_expirable(),
            _ => false,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("unit status", s))
    }
}

/// A single bag of collected blood.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodUnit {
    /// Globally unique identifier (UUID v4)
    pub unit_id: String,
    pub blood_type: BloodType,
    /// Donor the unit was collected from, if known
    pub donor_id: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Volume in ml, always > 0
    pub quantity_ml: u32,
    pub status: UnitStatus,
    /// Request this unit is reserved against (only while `reserved`)
    pub reserved_for: Option<String>,
    pub test_results: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Blood bank holding the unit
    pub blood_bank_id: Option<String>,
}

impl BloodUnit {
    /// Create a freshly collected unit.
    pub fn new(
        blood_type: BloodType,
        donor_id: Option<String>,
        collected_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        quantity_ml: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            unit_id: uuid::Uuid::new_v4().to_string(),
            blood_type,
            donor_id,
            collected_at,
            expires_at,
            quantity_ml,
            status: UnitStatus::Collected,
            reserved_for: None,
            test_results: String::new(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
            blood_bank_id: None,
        }
    }

    /// Expired strictly before `as_of`.
    pub fn is_past_expiry(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expiry| expiry < as_of)
    }
}
