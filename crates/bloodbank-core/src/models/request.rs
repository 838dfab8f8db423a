//! Blood requests raised on behalf of patients.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blood::{BloodType, Urgency};
use super::ParseEnumError;

/// Request status. Advances monotonically; only cancellation leaves the
/// approval path early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Open requests still need blood.
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }

    pub fn can_transition_to(&self, target: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, target),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Fulfilled)
                | (Approved, Cancelled)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "fulfilled" => Ok(RequestStatus::Fulfilled),
            "rejected" => Ok(RequestStatus::Rejected),
            "cancelled" => Ok(RequestStatus::Cancelled),
            _ => Err(ParseEnumError::new("request status", s)),
        }
    }
}

/// How a request was (or will be) satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    DonorMatch,
    BloodBank,
}

impl FulfillmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentType::DonorMatch => "donor_match",
            FulfillmentType::BloodBank => "blood_bank",
        }
    }
}

impl FromStr for FulfillmentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor_match" => Ok(FulfillmentType::DonorMatch),
            "blood_bank" => Ok(FulfillmentType::BloodBank),
            _ => Err(ParseEnumError::new("fulfillment type", s)),
        }
    }
}

/// A patient's request for blood.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodRequest {
    pub request_id: String,
    pub patient_id: String,
    pub blood_type_needed: BloodType,
    /// Units requested, always >= 1
    pub quantity_units: u32,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub fulfillment_type: Option<FulfillmentType>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BloodRequest {
    /// Create a pending request.
    pub fn new(
        patient_id: String,
        blood_type_needed: BloodType,
        quantity_units: u32,
        urgency: Urgency,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            blood_type_needed,
            quantity_units,
            urgency,
            status: RequestStatus::Pending,
            fulfillment_type: None,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// An open emergency request raises an `urgent` alert.
    pub fn is_urgent(&self) -> bool {
        self.urgency == Urgency::Emergency && self.status.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_transitions_are_monotonic() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Fulfilled));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Fulfilled.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Fulfilled));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn test_is_urgent() {
        let mut request = BloodRequest::new(
            "patient-1".into(),
            BloodType::OPositive,
            2,
            Urgency::Emergency,
            Utc::now(),
        );
        assert!(request.is_urgent());

        request.status = RequestStatus::Fulfilled;
        assert!(!request.is_urgent());

        request.status = RequestStatus::Approved;
        request.urgency = Urgency::High;
        assert!(!request.is_urgent());
    }
}
