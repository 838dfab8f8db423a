//! Property tests for the pure policy rules.

use bloodbank_core::config::StockThresholds;
use bloodbank_core::engine::{CompatibilityResolver, EligibilityEvaluator, StockLevel};
use bloodbank_core::models::{BloodType, Donor};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

fn blood_type() -> impl Strategy<Value = BloodType> {
    prop::sample::select(BloodType::ALL.to_vec())
}

fn date() -> impl Strategy<Value = NaiveDate> {
    (0i64..20_000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + Duration::days(offset)
    })
}

fn donor_who_gave_on(donated_on: NaiveDate) -> Donor {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut donor = Donor::new("donor".into(), now);
    donor.blood_type = Some(BloodType::OPositive);
    donor.last_donation_date = Some(donated_on);
    donor
}

proptest! {
    #[test]
    fn identity_rule_matches_only_the_same_type(needed in blood_type()) {
        let resolver = CompatibilityResolver::identity();
        let donors = resolver.compatible_donor_types(needed);
        prop_assert_eq!(donors.len(), 1);
        prop_assert!(donors.contains(&needed));
        prop_assert_eq!(resolver.compatible_recipient_types(needed), donors);
    }

    #[test]
    fn recipient_sets_invert_donor_sets(donor in blood_type(), needed in blood_type()) {
        for resolver in [CompatibilityResolver::identity(), CompatibilityResolver::abo_rh()] {
            prop_assert_eq!(
                resolver.compatible_donor_types(needed).contains(&donor),
                resolver.compatible_recipient_types(donor).contains(&needed)
            );
        }
    }

    #[test]
    fn abo_rh_always_accepts_o_negative_and_own_type(needed in blood_type()) {
        let resolver = CompatibilityResolver::abo_rh();
        prop_assert!(resolver.can_satisfy(BloodType::ONegative, needed));
        prop_assert!(resolver.can_satisfy(needed, needed));
        prop_assert!(resolver.can_satisfy(needed, BloodType::AbPositive));
    }

    #[test]
    fn cooldown_boundary_is_exactly_56_days(donated_on in date()) {
        let evaluator = EligibilityEvaluator::default();
        let donor = donor_who_gave_on(donated_on);

        prop_assert!(!evaluator.is_eligible_to_donate_now(&donor, donated_on + Duration::days(55)));
        prop_assert!(evaluator.is_eligible_to_donate_now(&donor, donated_on + Duration::days(56)));
        prop_assert_eq!(
            evaluator.next_eligible_date(&donor),
            Some(donated_on + Duration::days(56))
        );
    }

    #[test]
    fn first_time_donor_is_always_eligible(as_of in date()) {
        let mut donor = donor_who_gave_on(as_of);
        donor.last_donation_date = None;
        prop_assert!(EligibilityEvaluator::default().is_eligible_to_donate_now(&donor, as_of));
    }

    #[test]
    fn stock_level_follows_default_thresholds(ready in 0u32..200) {
        let expected = match ready {
            0 => StockLevel::OutOfStock,
            1..=4 => StockLevel::LowStock,
            5..=9 => StockLevel::Moderate,
            _ => StockLevel::Good,
        };
        prop_assert_eq!(
            StockLevel::from_ready_count(ready, &StockThresholds::default()),
            expected
        );
    }

    #[test]
    fn stock_level_never_drops_as_stock_grows(ready in 0u32..200) {
        let thresholds = StockThresholds::default();
        prop_assert!(
            StockLevel::from_ready_count(ready, &thresholds)
                <= StockLevel::from_ready_count(ready + 1, &thresholds)
        );
    }
}
