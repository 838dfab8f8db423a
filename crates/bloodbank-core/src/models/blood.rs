//! Blood group and urgency enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// ABO/Rh blood group. Closed set, declaration order is the display order
/// used by inventory summaries and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    /// All blood types in enumeration order (A+, A-, B+, B-, AB+, AB-, O+, O-).
    pub const ALL: [BloodType; 8] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }

    /// Position in [`BloodType::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// ABO antigens carried by red cells of this type: (A, B).
    pub fn abo_antigens(&self) -> (bool, bool) {
        match self {
            BloodType::APositive | BloodType::ANegative => (true, false),
            BloodType::BPositive | BloodType::BNegative => (false, true),
            BloodType::AbPositive | BloodType::AbNegative => (true, true),
            BloodType::OPositive | BloodType::ONegative => (false, false),
        }
    }

    pub fn is_rh_positive(&self) -> bool {
        matches!(
            self,
            BloodType::APositive
                | BloodType::BPositive
                | BloodType::AbPositive
                | BloodType::OPositive
        )
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the typographic minus the web forms sometimes submit.
        let normalized = s.trim().to_uppercase().replace('\u{2212}', "-");
        BloodType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ParseEnumError::new("blood type", s))
    }
}

/// Clinical urgency of a patient or request. Ordered low < medium < high < emergency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "emergency" => Ok(Urgency::Emergency),
            _ => Err(ParseEnumError::new("urgency", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_type_round_trips_through_str() {
        for t in BloodType::ALL {
            assert_eq!(t.as_str().parse::<BloodType>().unwrap(), t);
        }
    }

    #[test]
    fn test_blood_type_parse_is_lenient_on_case_and_minus() {
        assert_eq!("ab+".parse::<BloodType>().unwrap(), BloodType::AbPositive);
        assert_eq!(" O\u{2212} ".parse::<BloodType>().unwrap(), BloodType::ONegative);
        assert!("C+".parse::<BloodType>().is_err());
    }

    #[test]
    fn test_index_matches_enumeration_order() {
        for (i, t) in BloodType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Low < Urgency::Medium);
        assert!(Urgency::High < Urgency::Emergency);
    }

    #[test]
    fn test_serde_uses_clinical_labels() {
        let json = serde_json::to_string(&BloodType::AbNegative).unwrap();
        assert_eq!(json, "\"AB-\"");
        let urgency: Urgency = serde_json::from_str("\"emergency\"").unwrap();
        assert_eq!(urgency, Urgency::Emergency);
    }
}
