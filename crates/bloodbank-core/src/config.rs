//! Engine policy configuration.
//!
//! Every knob has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! cooldown_days = 56
//! compatibility = "identity"   # or "abo_rh"
//! unit_shelf_life_days = 42
//! default_unit_ml = 450
//!
//! [stock]
//! warning_below = 3
//! low_stock_below = 5
//! moderate_below = 10
//!
//! [telemetry]
//! log_level = "info"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which donor types may satisfy a requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityRule {
    /// Only the requested type itself.
    #[default]
    Identity,
    /// Red-cell ABO/Rh compatibility.
    AboRh,
}

/// Ready-unit thresholds for stock classification and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockThresholds {
    /// Below this many ready units (and above zero) a type raises a warning alert.
    pub warning_below: u32,
    pub low_stock_below: u32,
    pub moderate_below: u32,
}

impl Default for StockThresholds {
    fn default() -> Self {
        Self {
            warning_below: 3,
            low_stock_below: 5,
            moderate_below: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

/// Policy constants of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum days between two donations.
    pub cooldown_days: u32,
    pub stock: StockThresholds,
    pub compatibility: CompatibilityRule,
    /// Expiry applied at intake when none is given.
    pub unit_shelf_life_days: u32,
    /// Bag volume applied at intake when none is given.
    pub default_unit_ml: u32,
    pub telemetry: TelemetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_days: 56,
            stock: StockThresholds::default(),
            compatibility: CompatibilityRule::Identity,
            unit_shelf_life_days: 42,
            default_unit_ml: 450,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let stock = &self.stock;
        if stock.warning_below == 0 {
            return Err(ConfigError::Invalid(
                "stock.warning_below must be greater than 0".into(),
            ));
        }
        if stock.warning_below > stock.low_stock_below {
            return Err(ConfigError::Invalid(format!(
                "stock.warning_below ({}) must not exceed stock.low_stock_below ({})",
                stock.warning_below, stock.low_stock_below
            )));
        }
        if stock.low_stock_below >= stock.moderate_below {
            return Err(ConfigError::Invalid(format!(
                "stock.low_stock_below ({}) must be below stock.moderate_below ({})",
                stock.low_stock_below, stock.moderate_below
            )));
        }
        if self.cooldown_days == 0 {
            return Err(ConfigError::Invalid("cooldown_days must be greater than 0".into()));
        }
        if self.default_unit_ml == 0 {
            return Err(ConfigError::Invalid("default_unit_ml must be greater than 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cooldown_days, 56);
        assert_eq!(config.stock.low_stock_below, 5);
        assert_eq!(config.compatibility, CompatibilityRule::Identity);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            compatibility = "abo_rh"

            [stock]
            moderate_below = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.compatibility, CompatibilityRule::AboRh);
        assert_eq!(config.stock.moderate_below, 20);
        assert_eq!(config.stock.low_stock_below, 5);
        assert_eq!(config.default_unit_ml, 450);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = EngineConfig::from_toml_str(
            r#"
            [stock]
            low_stock_below = 12
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_cooldown() {
        let err = EngineConfig::from_toml_str("cooldown_days = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_rule() {
        let err = EngineConfig::from_toml_str(r#"compatibility = "universal""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cooldown_days = 84").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.cooldown_days, 84);

        let missing = EngineConfig::load("/nonexistent/bloodbank.toml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
