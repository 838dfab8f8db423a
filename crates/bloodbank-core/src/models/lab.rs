//! Lab tests and transfusion reports.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blood::BloodType;
use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    PreDonation,
    PostCollection,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::PreDonation => "pre_donation",
            TestType::PostCollection => "post_collection",
        }
    }
}

impl FromStr for TestType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_donation" => Ok(TestType::PreDonation),
            "post_collection" => Ok(TestType::PostCollection),
            _ => Err(ParseEnumError::new("test type", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::InProgress => "in_progress",
            TestStatus::Completed => "completed",
            TestStatus::Failed => "failed",
        }
    }
}

impl FromStr for TestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TestStatus::Pending),
            "in_progress" => Ok(TestStatus::InProgress),
            "completed" => Ok(TestStatus::Completed),
            "failed" => Ok(TestStatus::Failed),
            _ => Err(ParseEnumError::new("test status", s)),
        }
    }
}

/// Result reported by a lab technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabOutcome {
    /// Screening or unit passed; donor screenings carry the confirmed type.
    Passed {
        blood_type: Option<BloodType>,
        results: String,
    },
    Failed {
        results: String,
    },
}

impl LabOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, LabOutcome::Passed { .. })
    }

    pub fn results(&self) -> &str {
        match self {
            LabOutcome::Passed { results, .. } | LabOutcome::Failed { results } => results,
        }
    }
}

/// A recorded lab test against a donor or a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodTest {
    pub test_id: String,
    pub unit_id: Option<String>,
    pub donor_id: Option<String>,
    pub test_type: TestType,
    pub status: TestStatus,
    pub results: String,
    pub lab_technician: Option<String>,
    pub tested_at: DateTime<Utc>,
}

impl BloodTest {
    pub fn from_outcome(
        test_type: TestType,
        outcome: &LabOutcome,
        technician: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            test_id: uuid::Uuid::new_v4().to_string(),
            unit_id: None,
            donor_id: None,
            test_type,
            status: if outcome.passed() {
                TestStatus::Completed
            } else {
                TestStatus::Failed
            },
            results: outcome.results().to_string(),
            lab_technician: technician,
            tested_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransfusionOutcome {
    Successful,
    Complication,
    Failed,
}

impl TransfusionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransfusionOutcome::Successful => "successful",
            TransfusionOutcome::Complication => "complication",
            TransfusionOutcome::Failed => "failed",
        }
    }
}

impl FromStr for TransfusionOutcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "successful" => Ok(TransfusionOutcome::Successful),
            "complication" => Ok(TransfusionOutcome::Complication),
            "failed" => Ok(TransfusionOutcome::Failed),
            _ => Err(ParseEnumError::new("transfusion outcome", s)),
        }
    }
}

/// Record of a unit being transfused into a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransfusionReport {
    pub report_id: String,
    pub patient_id: String,
    pub unit_id: Option<String>,
    pub outcome: TransfusionOutcome,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}
