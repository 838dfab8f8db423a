//! Donor/recipient blood type compatibility.
//!
//! A rule is an 8×8 table `allowed[needed][donor]` indexed by
//! [`BloodType::index`]. Two tables ship built in: the legacy identity rule
//! and red-cell ABO/Rh compatibility. Anything else can be supplied with
//! [`CompatibilityResolver::from_table`].

use std::collections::BTreeSet;

use crate::config::CompatibilityRule;
use crate::models::BloodType;

const N: usize = BloodType::ALL.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityResolver {
    allowed: [[bool; N]; N],
}

impl CompatibilityResolver {
    pub fn from_rule(rule: CompatibilityRule) -> Self {
        match rule {
            CompatibilityRule::Identity => Self::identity(),
            CompatibilityRule::AboRh => Self::abo_rh(),
        }
    }

    /// A request for type T is satisfied only by type T.
    pub fn identity() -> Self {
        let mut allowed = [[false; N]; N];
        for (i, row) in allowed.iter_mut().enumerate() {
            row[i] = true;
        }
        Self { allowed }
    }

    /// Donor red cells must carry no A/B antigen the recipient lacks, and
    /// Rh-positive cells only go to Rh-positive recipients.
    pub fn abo_rh() -> Self {
        let mut allowed = [[false; N]; N];
        for needed in BloodType::ALL {
            let (needs_a, needs_b) = needed.abo_antigens();
            for donor in BloodType::ALL {
                let (has_a, has_b) = donor.abo_antigens();
                let abo_ok = (!has_a || needs_a) && (!has_b || needs_b);
                let rh_ok = !donor.is_rh_positive() || needed.is_rh_positive();
                allowed[needed.index()][donor.index()] = abo_ok && rh_ok;
            }
        }
        Self { allowed }
    }

    /// Build a rule from explicit `(needed, donors)` rows. Types without a row
    /// accept no donor at all.
    pub fn from_table<I, D>(rows: I) -> Self
    where
        I: IntoIterator<Item = (BloodType, D)>,
        D: IntoIterator<Item = BloodType>,
    {
        let mut allowed = [[false; N]; N];
        for (needed, donors) in rows {
            for donor in donors {
                allowed[needed.index()][donor.index()] = true;
            }
        }
        Self { allowed }
    }

    /// Donor types allowed to satisfy a request for `needed`.
    pub fn compatible_donor_types(&self, needed: BloodType) -> BTreeSet<BloodType> {
        BloodType::ALL
            .into_iter()
            .filter(|donor| self.can_satisfy(*donor, needed))
            .collect()
    }

    /// Recipient types a unit or donor of `donor` may go to.
    pub fn compatible_recipient_types(&self, donor: BloodType) -> BTreeSet<BloodType> {
        BloodType::ALL
            .into_iter()
            .filter(|needed| self.can_satisfy(donor, *needed))
            .collect()
    }

    pub fn can_satisfy(&self, donor: BloodType, needed: BloodType) -> bool {
        self.allowed[needed.index()][donor.index()]
    }
}

impl Default for CompatibilityResolver {
    fn default() -> Self {
        Self::identity()
    }
}
