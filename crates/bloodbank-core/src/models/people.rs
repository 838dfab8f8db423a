//! Donor and patient profiles.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::blood::{BloodType, Urgency};

/// A donor profile, a 1:1 extension of a user identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Donor {
    /// Local UUID
    pub donor_id: String,
    /// Owning user identity
    pub user_id: String,
    /// Lab-confirmed blood type (None until typed)
    pub blood_type: Option<BloodType>,
    /// Date of the most recent completed donation
    pub last_donation_date: Option<NaiveDate>,
    /// Cached eligibility flag, recomputed by the eligibility evaluator
    pub is_eligible: bool,
    /// Set when a lab screening failed; blocks eligibility until a passing screening
    pub is_deferred: bool,
    /// Free-text health notes
    pub health_status: String,
    /// Known medical conditions
    pub medical_conditions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donor {
    /// Create a new, untyped and therefore ineligible donor.
    pub fn new(user_id: String, now: DateTime<Utc>) -> Self {
        Self {
            donor_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            blood_type: None,
            last_donation_date: None,
            is_eligible: false,
            is_deferred: false,
            health_status: String::new(),
            medical_conditions: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the cached flag respects the typing invariant.
    pub fn eligibility_is_consistent(&self) -> bool {
        !self.is_eligible || self.blood_type.is_some()
    }
}

/// A patient profile, a 1:1 extension of a user identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub patient_id: String,
    pub user_id: String,
    pub blood_type_needed: BloodType,
    pub urgency: Urgency,
    /// Units needed, always >= 1
    pub units_needed: u32,
    pub medical_condition: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(
        user_id: String,
        blood_type_needed: BloodType,
        urgency: Urgency,
        units_needed: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            patient_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            blood_type_needed,
            urgency,
            units_needed,
            medical_condition: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_donor_is_not_eligible() {
        let donor = Donor::new("user-1".into(), Utc::now());
        assert!(!donor.is_eligible);
        assert!(donor.blood_type.is_none());
        assert!(donor.eligibility_is_consistent());
        assert_eq!(donor.donor_id.len(), 36); // UUID format
    }

    #[test]
    fn test_eligible_untyped_donor_is_inconsistent() {
        let mut donor = Donor::new("user-1".into(), Utc::now());
        donor.is_eligible = true;
        assert!(!donor.eligibility_is_consistent());
    }
}
