//! Directed follow edges between principals.

use chrono::Utc;
use rusqlite::params;

use reel_shared::{NotificationType, Principal};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::profiles::parse_principal;

impl Database {
    /// Create the edge `(caller, target)` if absent. Idempotent: a repeated
    /// follow creates neither a duplicate edge nor a duplicate notification.
    /// Returns whether the edge was newly created.
    pub fn follow_user(&self, caller: &Principal, target: &Principal) -> Result<bool> {
        if caller == target {
            return Err(StoreError::Validation("cannot follow yourself".into()));
        }

        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO follows (follower, followee, created_at)
             VALUES (?1, ?2, ?3)",
            params![caller.as_str(), target.as_str(), Utc::now().to_rfc3339()],
        )?;
        let newly_followed = affected > 0;

        if newly_followed {
            let message = format!("{} started following you", self.display_name(caller)?);
            self.dispatch(target, caller, NotificationType::Follow, &message)?;
            tracing::debug!(follower = %caller, followee = %target, "follow edge created");
        }

        Ok(newly_followed)
    }

    /// Remove the edge `(caller, target)` if present. Idempotent; never
    /// notifies.
    pub fn unfollow_user(&self, caller: &Principal, target: &Principal) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM follows WHERE follower = ?1 AND followee = ?2",
            params![caller.as_str(), target.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Principals following `principal`, in edge-creation order.
    pub fn get_followers(&self, principal: &Principal) -> Result<Vec<Principal>> {
        self.edge_endpoints(
            "SELECT follower FROM follows
             WHERE followee = ?1
             ORDER BY created_at ASC, follower ASC",
            principal,
        )
    }

    /// Principals that `principal` follows, in edge-creation order.
    pub fn get_following(&self, principal: &Principal) -> Result<Vec<Principal>> {
        self.edge_endpoints(
            "SELECT followee FROM follows
             WHERE follower = ?1
             ORDER BY created_at ASC, followee ASC",
            principal,
        )
    }

    fn edge_endpoints(&self, sql: &str, principal: &Principal) -> Result<Vec<Principal>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![principal.as_str()], |row| {
            parse_principal(row.get(0)?, 0)
        })?;

        let mut principals = Vec::new();
        for row in rows {
            principals.push(row?);
        }
        Ok(principals)
    }
}
