//! Blood banks holding inventory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blood bank operated by a hospital. Units may name the bank holding them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodBank {
    pub blood_bank_id: String,
    pub name: String,
    /// Operating hospital
    pub hospital: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl BloodBank {
    pub fn new(name: String, hospital: String, now: DateTime<Utc>) -> Self {
        Self {
            blood_bank_id: uuid::Uuid::new_v4().to_string(),
            name,
            hospital,
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            is_active: true,
            created_at: now,
        }
    }
}
