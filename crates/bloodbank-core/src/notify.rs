//! Notification collaborator.
//!
//! The engine hands every message to a [`NotificationSink`] through
//! [`dispatch`], which never lets a delivery failure reach the caller.

use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::db::{Database, DbError};
use crate::models::Notification;

/// Notification delivery errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification store error: {0}")]
    Store(#[from] DbError),

    #[error("Notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives notifications produced by engine operations.
pub trait NotificationSink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Persist into the `notifications` table.
impl NotificationSink for Database {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.insert_notification(notification)?;
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Collects notifications in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Notifications delivered to one user identity.
    pub fn sent_to(&self, user_id: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|e| NotifyError::Unavailable(format!("Lock poisoned: {}", e)))?
            .push(notification.clone());
        Ok(())
    }
}

/// Deliver best-effort: failures are logged and dropped.
pub fn dispatch(sink: &dyn NotificationSink, notification: Notification) {
    if let Err(e) = sink.notify(&notification) {
        warn!(
            user_id = %notification.user_id,
            title = %notification.title,
            error = %e,
            "notification dropped"
        );
    }
}
