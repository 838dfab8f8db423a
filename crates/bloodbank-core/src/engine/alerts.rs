//! Alert classification over inventory levels and urgent requests.
//!
//! Alerts are recomputed on every call; nothing is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BloodType, UnitStatus, Urgency};

use super::{EngineResult, MatchAllocator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Critical,
    Warning,
    Urgent,
    Info,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Critical => "critical",
            AlertLevel::Warning => "warning",
            AlertLevel::Urgent => "urgent",
            AlertLevel::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub blood_type: Option<BloodType>,
    pub request_id: Option<String>,
    pub patient_id: Option<String>,
    /// Request creation time for urgent alerts, `as_of` otherwise.
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    fn stock(level: AlertLevel, blood_type: BloodType, message: String, as_of: DateTime<Utc>) -> Self {
        Self {
            level,
            message,
            blood_type: Some(blood_type),
            request_id: None,
            patient_id: None,
            raised_at: as_of,
        }
    }
}

impl<'a> MatchAllocator<'a> {
    /// Current alerts, in this order: critical and warning stock alerts by
    /// blood type order, urgent requests newest first, then the expired-units
    /// summary.
    pub fn classify_alerts(&self, as_of: DateTime<Utc>) -> EngineResult<Vec<Alert>> {
        let db = self.engine.db;
        let warning_below = self.engine.config.stock.warning_below;
        let mut alerts = Vec::new();

        for blood_type in BloodType::ALL {
            let ready = db.count_units(blood_type, UnitStatus::Ready)?;
            if ready == 0 {
                alerts.push(Alert::stock(
                    AlertLevel::Critical,
                    blood_type,
                    format!("CRITICAL: {} blood type is out of stock", blood_type),
                    as_of,
                ));
            } else if ready < warning_below {
                alerts.push(Alert::stock(
                    AlertLevel::Warning,
                    blood_type,
                    format!(
                        "WARNING: {} blood type has only {} units remaining",
                        blood_type, ready
                    ),
                    as_of,
                ));
            }
        }

        for request in db.list_open_requests_by_urgency(Urgency::Emergency)? {
            alerts.push(Alert {
                level: AlertLevel::Urgent,
                message: format!(
                    "EMERGENCY: Patient needs {} blood urgently",
                    request.blood_type_needed
                ),
                blood_type: Some(request.blood_type_needed),
                request_id: Some(request.request_id),
                patient_id: Some(request.patient_id),
                raised_at: request.created_at,
            });
        }

        let expired = db.count_units_in_status(UnitStatus::Expired)?;
        if expired > 0 {
            alerts.push(Alert {
                level: AlertLevel::Info,
                message: format!(
                    "INFO: {} blood units have expired and need disposal",
                    expired
                ),
                blood_type: None,
                request_id: None,
                patient_id: None,
                raised_at: as_of,
            });
        }

        Ok(alerts)
    }
}
