//! Notification storage and the internal dispatcher.
//!
//! Notifications are created only as a side effect of another principal's
//! action (like, comment, follow). The dispatcher enforces self-action
//! suppression uniformly: an action never notifies its own actor.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use reel_shared::{NotificationType, Principal};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Notification;
use crate::profiles::parse_principal;

impl Database {
    /// Append a notification for `recipient`, attributed to `actor`.
    ///
    /// Returns the new notification's id, or `None` when the action was the
    /// recipient's own (suppressed, not an error). Internal to the store:
    /// clients can never create notifications directly.
    pub(crate) fn dispatch(
        &self,
        recipient: &Principal,
        actor: &Principal,
        kind: NotificationType,
        message: &str,
    ) -> Result<Option<Uuid>> {
        if recipient == actor {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        self.conn().execute(
            "INSERT INTO notifications (id, recipient, kind, message, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                id.to_string(),
                recipient.as_str(),
                kind.as_str(),
                message,
                Utc::now().to_rfc3339(),
            ],
        )?;

        tracing::debug!(id = %id, recipient = %recipient, kind = %kind, "notification dispatched");
        Ok(Some(id))
    }

    /// All notifications for the caller, newest first.
    pub fn get_notifications(&self, caller: &Principal) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, recipient, kind, message, is_read, created_at
             FROM notifications
             WHERE recipient = ?1
             ORDER BY created_at DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![caller.as_str()], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Set the read flag on one of the caller's notifications.
    ///
    /// Fails with [`StoreError::NotFound`] for unknown ids and
    /// [`StoreError::PermissionDenied`] when the notification belongs to a
    /// different principal.
    pub fn update_notification_status(
        &self,
        caller: &Principal,
        id: Uuid,
        is_read: bool,
    ) -> Result<()> {
        let recipient: String = self
            .conn()
            .query_row(
                "SELECT recipient FROM notifications WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        if recipient != caller.as_str() {
            return Err(StoreError::PermissionDenied(
                "notification belongs to another principal".into(),
            ));
        }

        self.conn().execute(
            "UPDATE notifications SET is_read = ?1 WHERE id = ?2",
            params![is_read as i32, id.to_string()],
        )?;
        Ok(())
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id_str: String = row.get(0)?;
    let recipient = parse_principal(row.get(1)?, 1)?;
    let kind_str: String = row.get(2)?;
    let message: String = row.get(3)?;
    let is_read_int: i32 = row.get(4)?;
    let ts_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let notification_type = kind_str.parse::<NotificationType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Notification {
        id,
        notification_type,
        recipient,
        is_read: is_read_int != 0,
        message,
        timestamp,
    })
}
