//! Profile, role, and user-search operations.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use reel_shared::constants::{MAX_BIO_LEN, MAX_SEARCH_QUERY_LEN, MAX_USERNAME_LEN};
use reel_shared::{Principal, UserRole};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{CallerProfile, ProfileUpdate, UserProfile, UserSearchHit};

impl Database {
    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Upsert the caller's profile. A save replaces every client-owned field;
    /// role and phone-verification state are not touched.
    pub fn save_profile(&self, caller: &Principal, update: &ProfileUpdate) -> Result<()> {
        if update.username.trim().is_empty() {
            return Err(StoreError::Validation("username must not be empty".into()));
        }
        if update.username.len() > MAX_USERNAME_LEN {
            return Err(StoreError::Validation(format!(
                "username too long: {} chars (max {MAX_USERNAME_LEN})",
                update.username.len()
            )));
        }
        if update.bio.len() > MAX_BIO_LEN {
            return Err(StoreError::Validation(format!(
                "bio too long: {} chars (max {MAX_BIO_LEN})",
                update.bio.len()
            )));
        }

        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO profiles (principal, username, bio, profile_picture, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(principal) DO UPDATE SET
                 username = excluded.username,
                 bio = excluded.bio,
                 profile_picture = excluded.profile_picture,
                 updated_at = excluded.updated_at",
            params![
                caller.as_str(),
                update.username,
                update.bio,
                update.profile_picture.as_ref().map(|b| b.as_str()),
                now,
            ],
        )?;

        tracing::info!(principal = %caller, "profile saved");
        Ok(())
    }

    /// Fetch the publicly visible profile for any principal.
    ///
    /// `None` means "no profile saved yet", which the client treats as a
    /// distinct state from an error.
    pub fn get_profile(&self, principal: &Principal) -> Result<Option<UserProfile>> {
        self.conn()
            .query_row(
                "SELECT username, bio, profile_picture FROM profiles WHERE principal = ?1",
                params![principal.as_str()],
                row_to_profile,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// Fetch the caller's own profile, including owner-only phone state.
    pub fn get_caller_profile(&self, caller: &Principal) -> Result<Option<CallerProfile>> {
        let Some(profile) = self.get_profile(caller)? else {
            return Ok(None);
        };

        let phone_number = self.verified_phone(caller)?;

        Ok(Some(CallerProfile {
            username: profile.username,
            bio: profile.bio,
            profile_picture: profile.profile_picture,
            is_phone_verified: phone_number.is_some(),
            phone_number,
        }))
    }

    /// Case-insensitive substring search over usernames.
    ///
    /// Ordered by username then principal so repeated calls are stable.
    /// An empty or oversized query matches nothing.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserSearchHit>> {
        let query = query.trim();
        if query.is_empty() || query.len() > MAX_SEARCH_QUERY_LEN {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = self.conn().prepare(
            "SELECT principal, username, bio, profile_picture
             FROM profiles
             WHERE username LIKE ?1 ESCAPE '\\'
             ORDER BY username ASC, principal ASC",
        )?;

        let rows = stmt.query_map(params![pattern], |row| {
            let principal_str: String = row.get(0)?;
            let principal = parse_principal(principal_str, 0)?;
            let username: String = row.get(1)?;
            let bio: String = row.get(2)?;
            let picture = row
                .get::<_, Option<String>>(3)?
                .map(|s| parse_blob_ref(s, 3))
                .transpose()?;
            Ok(UserSearchHit {
                principal,
                profile: UserProfile {
                    username,
                    bio,
                    profile_picture: picture,
                },
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    /// The role assigned to a principal, defaulting to `User` for any
    /// authenticated principal without an explicit assignment.
    pub fn get_role(&self, principal: &Principal) -> Result<UserRole> {
        let role: Option<UserRole> = self
            .conn()
            .query_row(
                "SELECT role FROM roles WHERE principal = ?1",
                params![principal.as_str()],
                |row| {
                    let text: String = row.get(0)?;
                    text.parse::<UserRole>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })
                },
            )
            .optional()?;

        Ok(role.unwrap_or(UserRole::User))
    }

    pub fn is_admin(&self, principal: &Principal) -> Result<bool> {
        Ok(self.get_role(principal)? == UserRole::Admin)
    }

    /// Assign a role to any principal. Restricted to admin callers.
    pub fn assign_role(&self, caller: &Principal, target: &Principal, role: UserRole) -> Result<()> {
        if !self.is_admin(caller)? {
            return Err(StoreError::PermissionDenied(
                "only admins may assign roles".into(),
            ));
        }

        self.conn().execute(
            "INSERT OR REPLACE INTO roles (principal, role) VALUES (?1, ?2)",
            params![target.as_str(), role.as_str()],
        )?;

        tracing::info!(principal = %target, role = %role, granted_by = %caller, "role assigned");
        Ok(())
    }

    /// Grant admin without a permission check. Used at startup to seed the
    /// bootstrap admins from configuration.
    pub fn seed_admin(&self, principal: &Principal) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO roles (principal, role) VALUES (?1, ?2)",
            params![principal.as_str(), UserRole::Admin.as_str()],
        )?;
        Ok(())
    }

    /// Username to show in notification messages; falls back to the raw
    /// principal text for principals that never saved a profile.
    pub(crate) fn display_name(&self, principal: &Principal) -> Result<String> {
        let username: Option<String> = self
            .conn()
            .query_row(
                "SELECT username FROM profiles WHERE principal = ?1",
                params![principal.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(username.unwrap_or_else(|| principal.as_str().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`UserProfile`].
fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let username: String = row.get(0)?;
    let bio: String = row.get(1)?;
    let picture = row
        .get::<_, Option<String>>(2)?
        .map(|s| parse_blob_ref(s, 2))
        .transpose()?;

    Ok(UserProfile {
        username,
        bio,
        profile_picture: picture,
    })
}

pub(crate) fn parse_principal(text: String, col: usize) -> rusqlite::Result<Principal> {
    Principal::parse(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_blob_ref(text: String, col: usize) -> rusqlite::Result<reel_shared::BlobRef> {
    reel_shared::BlobRef::parse(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Escape `%`, `_`, and the escape character itself for a LIKE pattern.
fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileUpdate;
    use reel_shared::BlobRef;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn principal(text: &str) -> Principal {
        Principal::parse(text).unwrap()
    }

    fn update(username: &str, bio: &str) -> ProfileUpdate {
        ProfileUpdate {
            username: username.to_string(),
            bio: bio.to_string(),
            profile_picture: None,
        }
    }

    #[test]
    fn missing_profile_is_none_not_error() {
        let (_dir, db) = open_db();
        assert_eq!(db.get_profile(&principal("alice")).unwrap(), None);
        assert_eq!(db.get_caller_profile(&principal("alice")).unwrap(), None);
    }

    #[test]
    fn save_is_full_replace() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let with_picture = ProfileUpdate {
            username: "Alice".to_string(),
            bio: "hello".to_string(),
            profile_picture: Some(BlobRef::parse("https://cdn.example/a.png").unwrap()),
        };
        db.save_profile(&alice, &with_picture).unwrap();

        // Second save without a picture must clear it (no partial merge).
        db.save_profile(&alice, &update("Alice2", "")).unwrap();

        let profile = db.get_profile(&alice).unwrap().unwrap();
        assert_eq!(profile.username, "Alice2");
        assert_eq!(profile.bio, "");
        assert_eq!(profile.profile_picture, None);
    }

    #[test]
    fn empty_username_rejected_and_prior_state_kept() {
        let (_dir, db) = open_db();
        let alice = principal("alice");
        db.save_profile(&alice, &update("Alice", "bio")).unwrap();

        let err = db.save_profile(&alice, &update("  ", "x")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let profile = db.get_profile(&alice).unwrap().unwrap();
        assert_eq!(profile.username, "Alice");
        assert_eq!(profile.bio, "bio");
    }

    #[test]
    fn oversized_fields_rejected() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let long_name = update(&"x".repeat(MAX_USERNAME_LEN + 1), "");
        assert!(matches!(
            db.save_profile(&alice, &long_name),
            Err(StoreError::Validation(_))
        ));

        let long_bio = update("alice", &"x".repeat(MAX_BIO_LEN + 1));
        assert!(matches!(
            db.save_profile(&alice, &long_bio),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn public_profile_hides_phone_state() {
        let (_dir, db) = open_db();
        let alice = principal("alice");
        db.save_profile(&alice, &update("Alice", "")).unwrap();

        let code = db.start_phone_verification(&alice, "+15551234567").unwrap();
        db.confirm_phone_verification(&alice, "+15551234567", &code)
            .unwrap();

        let own = db.get_caller_profile(&alice).unwrap().unwrap();
        assert!(own.is_phone_verified);
        assert_eq!(own.phone_number.as_deref(), Some("+15551234567"));

        // The public view carries no phone fields at all.
        let public = db.get_profile(&alice).unwrap().unwrap();
        assert_eq!(public.username, "Alice");
    }

    #[test]
    fn search_matches_substring_case_insensitive() {
        let (_dir, db) = open_db();
        db.save_profile(&principal("alice"), &update("AliceWonder", ""))
            .unwrap();
        db.save_profile(&principal("bob"), &update("Bob", ""))
            .unwrap();
        db.save_profile(&principal("carol"), &update("malice", ""))
            .unwrap();

        let hits = db.search_users("alice").unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.profile.username.as_str()).collect();
        assert_eq!(names, vec!["AliceWonder", "malice"]);

        assert!(db.search_users("").unwrap().is_empty());
        assert!(db.search_users("zzz").unwrap().is_empty());
    }

    #[test]
    fn search_escapes_like_wildcards() {
        let (_dir, db) = open_db();
        db.save_profile(&principal("alice"), &update("100%real", ""))
            .unwrap();
        db.save_profile(&principal("bob"), &update("100xreal", ""))
            .unwrap();

        let hits = db.search_users("100%").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].profile.username, "100%real");
    }

    #[test]
    fn role_defaults_to_user_and_assignment_requires_admin() {
        let (_dir, db) = open_db();
        let root = principal("root");
        let alice = principal("alice");

        assert_eq!(db.get_role(&alice).unwrap(), UserRole::User);
        assert!(!db.is_admin(&alice).unwrap());

        // Non-admin cannot assign.
        let err = db.assign_role(&alice, &alice, UserRole::Admin).unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
        assert_eq!(db.get_role(&alice).unwrap(), UserRole::User);

        // Seeded admin can.
        db.seed_admin(&root).unwrap();
        assert!(db.is_admin(&root).unwrap());
        db.assign_role(&root, &alice, UserRole::Admin).unwrap();
        assert!(db.is_admin(&alice).unwrap());
    }
}
