//! Stored notifications (backing store of the default notification sink).

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{label, Database, DbResult};
use crate::models::Notification;

impl Database {
    /// Insert a notification.
    pub fn insert_notification(&self, notification: &Notification) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO notifications (
                notification_id, user_id, category, title, message,
                priority, is_read, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                notification.notification_id,
                notification.user_id,
                notification.category.as_str(),
                notification.title,
                notification.message,
                notification.priority.as_str(),
                notification.is_read,
                notification.created_at,
            ],
        )?;
        Ok(())
    }

    /// Notifications for a user, newest first.
    pub fn list_notifications(&self, user_id: &str, limit: usize) -> DbResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT notification_id, user_id, category, title, message,
                   priority, is_read, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, bool>(6)?,
                row.get::<_, DateTime<Utc>>(7)?,
            ))
        })?;

        let mut notifications = Vec::new();
        for row in rows {
            let (notification_id, user_id, category, title, message, priority, is_read, created_at) =
                row?;
            notifications.push(Notification {
                notification_id,
                user_id,
                category: label(&category)?,
                title,
                message,
                priority: label(&priority)?,
                is_read,
                created_at,
            });
        }
        Ok(notifications)
    }

    /// Mark one of a user's notifications as read.
    pub fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE notification_id = ? AND user_id = ?",
            [notification_id, user_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Number of unread notifications for a user.
    pub fn unread_notification_count(&self, user_id: &str) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationCategory, Priority};
    use chrono::Duration;

    #[test]
    fn test_notification_inbox() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let first = Notification::new(
            "user-1",
            NotificationCategory::Appointment,
            "Appointment Scheduled",
            "See you Monday.",
            Priority::Medium,
            now,
        );
        let second = Notification::new(
            "user-1",
            NotificationCategory::DonorMatch,
            "New Match Request",
            "A patient needs O+.",
            Priority::High,
            now + Duration::seconds(1),
        );
        let other = Notification::new(
            "user-2",
            NotificationCategory::System,
            "Hello",
            "",
            Priority::Low,
            now,
        );
        for n in [&first, &second, &other] {
            db.insert_notification(n).unwrap();
        }

        let inbox = db.list_notifications("user-1", 10).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].notification_id, second.notification_id);
        assert_eq!(db.unread_notification_count("user-1").unwrap(), 2);

        // Another user's id cannot mark it
        assert!(!db.mark_notification_read("user-2", &first.notification_id).unwrap());
        assert!(db.mark_notification_read("user-1", &first.notification_id).unwrap());
        assert_eq!(db.unread_notification_count("user-1").unwrap(), 1);

        assert_eq!(db.list_notifications("user-1", 1).unwrap().len(), 1);
    }
}
