//! Donor-patient match records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Match status.
///
/// `pending --accept--> accepted --complete--> completed`,
/// `pending --decline--> declined`, `pending|accepted --cancel--> cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Declined => "declined",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Pending and accepted are the only non-terminal states.
    pub fn is_active(&self) -> bool {
        matches!(self, MatchStatus::Pending | MatchStatus::Accepted)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "accepted" => Ok(MatchStatus::Accepted),
            "declined" => Ok(MatchStatus::Declined),
            "completed" => Ok(MatchStatus::Completed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            _ => Err(ParseEnumError::new("match status", s)),
        }
    }
}

/// Explicit answer to a match invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseDecision {
    Accept,
    Decline,
}

/// A response from one side of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub decision: ResponseDecision,
    pub text: String,
}

impl MatchResponse {
    pub fn accept(text: impl Into<String>) -> Self {
        Self {
            decision: ResponseDecision::Accept,
            text: text.into(),
        }
    }

    pub fn decline(text: impl Into<String>) -> Self {
        Self {
            decision: ResponseDecision::Decline,
            text: text.into(),
        }
    }

    /// Classify a free-text response: anything containing "accept"
    /// (case-insensitive) accepts, everything else declines.
    pub fn from_free_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let decision = if text.to_lowercase().contains("accept") {
            ResponseDecision::Accept
        } else {
            ResponseDecision::Decline
        };
        Self { decision, text }
    }

    pub fn target_status(&self) -> MatchStatus {
        match self.decision {
            ResponseDecision::Accept => MatchStatus::Accepted,
            ResponseDecision::Decline => MatchStatus::Declined,
        }
    }
}

/// A pairing of an eligible donor with a patient's request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DonorPatientMatch {
    pub match_id: String,
    pub donor_id: String,
    pub patient_id: String,
    pub request_id: String,
    pub status: MatchStatus,
    pub donor_response: String,
    pub patient_response: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DonorPatientMatch {
    pub fn new(
        donor_id: String,
        patient_id: String,
        request_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            match_id: uuid::Uuid::new_v4().to_string(),
            donor_id,
            patient_id,
            request_id,
            status: MatchStatus::Pending,
            donor_response: String::new(),
            patient_response: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_text_shim() {
        assert_eq!(
            MatchResponse::from_free_text("I ACCEPT, see you Monday").decision,
            ResponseDecision::Accept
        );
        assert_eq!(
            MatchResponse::from_free_text("Accepted").decision,
            ResponseDecision::Accept
        );
        assert_eq!(
            MatchResponse::from_free_text("sorry, travelling").decision,
            ResponseDecision::Decline
        );
    }

    #[test]
    fn test_target_status() {
        assert_eq!(MatchResponse::accept("").target_status(), MatchStatus::Accepted);
        assert_eq!(MatchResponse::decline("").target_status(), MatchStatus::Declined);
    }

    #[test]
    fn test_active_states() {
        assert!(MatchStatus::Pending.is_active());
        assert!(MatchStatus::Accepted.is_active());
        assert!(!MatchStatus::Declined.is_active());
        assert!(!MatchStatus::Completed.is_active());
        assert!(!MatchStatus::Cancelled.is_active());
    }
}
