//! Notification payloads handed to the notification sink.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Appointment,
    BloodRequest,
    DonorMatch,
    TestResult,
    System,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Appointment => "appointment",
            NotificationCategory::BloodRequest => "blood_request",
            NotificationCategory::DonorMatch => "donor_match",
            NotificationCategory::TestResult => "test_result",
            NotificationCategory::System => "system",
        }
    }
}

impl FromStr for NotificationCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "appointment" => Ok(NotificationCategory::Appointment),
            "blood_request" => Ok(NotificationCategory::BloodRequest),
            "donor_match" => Ok(NotificationCategory::DonorMatch),
            "test_result" => Ok(NotificationCategory::TestResult),
            "system" => Ok(NotificationCategory::System),
            _ => Err(ParseEnumError::new("notification category", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParseEnumError::new("priority", s)),
        }
    }
}

/// A message for one user identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub notification_id: String,
    /// Recipient user identity
    pub user_id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            notification_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            category,
            title: title.into(),
            message: message.into(),
            priority,
            is_read: false,
            created_at: now,
        }
    }
}
