//! Donation cooldown and the cached eligibility flag.

use chrono::{Days, NaiveDate};

use crate::models::Donor;

/// Calendar rules around the donation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityEvaluator {
    cooldown_days: u32,
}

impl EligibilityEvaluator {
    pub fn new(cooldown_days: u32) -> Self {
        Self { cooldown_days }
    }

    pub fn cooldown_days(&self) -> u32 {
        self.cooldown_days
    }

    /// A donor who never donated is eligible; otherwise the full cooldown
    /// must have elapsed by `as_of`.
    pub fn is_eligible_to_donate_now(&self, donor: &Donor, as_of: NaiveDate) -> bool {
        match self.next_eligible_date(donor) {
            None => true,
            Some(next) => as_of >= next,
        }
    }

    /// `last_donation_date + cooldown`, or `None` for a first-time donor.
    pub fn next_eligible_date(&self, donor: &Donor) -> Option<NaiveDate> {
        donor
            .last_donation_date
            .map(|last| self.next_eligible_after(last))
    }

    /// Next eligible date after a donation on `donated_on`.
    pub fn next_eligible_after(&self, donated_on: NaiveDate) -> NaiveDate {
        donated_on
            .checked_add_days(Days::new(u64::from(self.cooldown_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// The value the cached `is_eligible` flag should hold on `as_of`:
    /// typed, not deferred, and out of cooldown.
    pub fn derive_flag(&self, donor: &Donor, as_of: NaiveDate) -> bool {
        donor.blood_type.is_some()
            && !donor.is_deferred
            && self.is_eligible_to_donate_now(donor, as_of)
    }
}

impl Default for EligibilityEvaluator {
    fn default() -> Self {
        Self::new(56)
    }
}
