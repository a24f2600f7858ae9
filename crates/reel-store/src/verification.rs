//! Phone verification: short-lived codes issued per (principal, phone number).
//!
//! State machine: Unverified -> CodeSent -> Verified. The pending code
//! expires after [`VERIFICATION_CODE_TTL_SECS`] seconds and is revoked after
//! [`MAX_VERIFICATION_ATTEMPTS`] wrong guesses. The code is returned directly
//! to the caller; out-of-band delivery is a deployment concern, not a store
//! concern.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use reel_shared::constants::{
    MAX_PHONE_DIGITS, MAX_VERIFICATION_ATTEMPTS, MIN_PHONE_DIGITS, VERIFICATION_CODE_TTL_SECS,
};
use reel_shared::Principal;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Issue a fresh 6-digit code for the caller's claim on `phone_number`.
    ///
    /// A repeated call overwrites the pending code and resets the attempt
    /// counter. Returns the code.
    pub fn start_phone_verification(
        &self,
        caller: &Principal,
        phone_number: &str,
    ) -> Result<String> {
        validate_phone_number(phone_number)?;

        let code = format!(
            "{:06}",
            rand::thread_rng().gen_range(0..1_000_000u32)
        );
        let now = Utc::now();
        let expires_at = now + Duration::seconds(VERIFICATION_CODE_TTL_SECS);

        self.conn().execute(
            "INSERT OR REPLACE INTO phone_verifications
                 (principal, phone_number, code, expires_at, attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                caller.as_str(),
                phone_number,
                code,
                expires_at.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        tracing::info!(principal = %caller, "verification code issued");
        Ok(code)
    }

    /// Confirm a pending code. On success the phone number is persisted as
    /// verified for the caller and the pending code is consumed.
    ///
    /// Failure taxonomy: [`StoreError::CodeExpired`] when the pending code's
    /// window has passed, [`StoreError::InvalidCode`] for everything else
    /// (no pending code, wrong code, attempt cap reached) -- deliberately
    /// revealing nothing more.
    pub fn confirm_phone_verification(
        &self,
        caller: &Principal,
        phone_number: &str,
        code: &str,
    ) -> Result<()> {
        let pending: Option<(String, String, u32)> = self
            .conn()
            .query_row(
                "SELECT code, expires_at, attempts FROM phone_verifications
                 WHERE principal = ?1 AND phone_number = ?2",
                params![caller.as_str(), phone_number],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((expected, expires_str, attempts)) = pending else {
            return Err(StoreError::InvalidCode);
        };

        let expires_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&expires_str)
            .map(|dt| dt.with_timezone(&Utc))?;

        if Utc::now() > expires_at {
            self.drop_pending(caller, phone_number)?;
            return Err(StoreError::CodeExpired);
        }

        if code != expected {
            let attempts = attempts + 1;
            if attempts >= MAX_VERIFICATION_ATTEMPTS {
                self.drop_pending(caller, phone_number)?;
                tracing::warn!(principal = %caller, "verification code revoked after repeated failures");
            } else {
                self.conn().execute(
                    "UPDATE phone_verifications SET attempts = ?1
                     WHERE principal = ?2 AND phone_number = ?3",
                    params![attempts, caller.as_str(), phone_number],
                )?;
            }
            return Err(StoreError::InvalidCode);
        }

        self.conn().execute(
            "INSERT OR REPLACE INTO verified_phones (principal, phone_number, verified_at)
             VALUES (?1, ?2, ?3)",
            params![caller.as_str(), phone_number, Utc::now().to_rfc3339()],
        )?;
        self.drop_pending(caller, phone_number)?;

        tracing::info!(principal = %caller, "phone number verified");
        Ok(())
    }

    /// The caller's verified phone number, if any.
    pub fn verified_phone(&self, principal: &Principal) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT phone_number FROM verified_phones WHERE principal = ?1",
                params![principal.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    fn drop_pending(&self, caller: &Principal, phone_number: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM phone_verifications WHERE principal = ?1 AND phone_number = ?2",
            params![caller.as_str(), phone_number],
        )?;
        Ok(())
    }
}

/// Accept E.164-style numbers: optional leading `+`, then 7-15 digits.
fn validate_phone_number(phone_number: &str) -> Result<()> {
    let digits = phone_number.strip_prefix('+').unwrap_or(phone_number);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(StoreError::Validation(
            "phone number must contain only digits (optional leading +)".into(),
        ));
    }
    if digits.len() < MIN_PHONE_DIGITS || digits.len() > MAX_PHONE_DIGITS {
        return Err(StoreError::Validation(format!(
            "phone number must have {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: &str = "+15551234567";

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn principal(text: &str) -> Principal {
        Principal::parse(text).unwrap()
    }

    fn expire_pending(db: &Database, caller: &Principal) {
        db.conn()
            .execute(
                "UPDATE phone_verifications SET expires_at = ?1 WHERE principal = ?2",
                params!["2000-01-01T00:00:00+00:00", caller.as_str()],
            )
            .unwrap();
    }

    #[test]
    fn happy_path_verifies_exactly_once() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let code = db.start_phone_verification(&alice, PHONE).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(db.verified_phone(&alice).unwrap(), None);

        db.confirm_phone_verification(&alice, PHONE, &code).unwrap();
        assert_eq!(db.verified_phone(&alice).unwrap().as_deref(), Some(PHONE));

        // The code is consumed; it cannot be replayed.
        let err = db
            .confirm_phone_verification(&alice, PHONE, &code)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCode));
    }

    #[test]
    fn wrong_code_leaves_unverified() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let code = db.start_phone_verification(&alice, PHONE).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = db
            .confirm_phone_verification(&alice, PHONE, wrong)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCode));
        assert_eq!(db.verified_phone(&alice).unwrap(), None);

        // The real code still works while attempts remain.
        db.confirm_phone_verification(&alice, PHONE, &code).unwrap();
        assert!(db.verified_phone(&alice).unwrap().is_some());
    }

    #[test]
    fn attempt_cap_revokes_pending_code() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let code = db.start_phone_verification(&alice, PHONE).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..MAX_VERIFICATION_ATTEMPTS {
            let err = db
                .confirm_phone_verification(&alice, PHONE, wrong)
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidCode));
        }

        // The correct code was revoked along with the pending row.
        let err = db
            .confirm_phone_verification(&alice, PHONE, &code)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCode));
        assert_eq!(db.verified_phone(&alice).unwrap(), None);
    }

    #[test]
    fn expired_code_is_distinguished() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let code = db.start_phone_verification(&alice, PHONE).unwrap();
        expire_pending(&db, &alice);

        let err = db
            .confirm_phone_verification(&alice, PHONE, &code)
            .unwrap_err();
        assert!(matches!(err, StoreError::CodeExpired));

        // The expired pending row is gone; a retry is indistinguishable from
        // never having started.
        let err = db
            .confirm_phone_verification(&alice, PHONE, &code)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCode));
    }

    #[test]
    fn restart_overwrites_pending_code() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let mut first = db.start_phone_verification(&alice, PHONE).unwrap();
        let second = db.start_phone_verification(&alice, PHONE).unwrap();
        if first == second {
            // Astronomically unlikely, but make the codes differ for the
            // assertion below.
            first = format!("{:06}", (second.parse::<u32>().unwrap() + 1) % 1_000_000);
        }

        let err = db
            .confirm_phone_verification(&alice, PHONE, &first)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCode));

        db.confirm_phone_verification(&alice, PHONE, &second)
            .unwrap();
        assert!(db.verified_phone(&alice).unwrap().is_some());
    }

    #[test]
    fn malformed_numbers_rejected() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        for bad in ["", "+", "12345", "555-123-4567", "+1234567890123456"] {
            assert!(
                matches!(
                    db.start_phone_verification(&alice, bad),
                    Err(StoreError::Validation(_))
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn verification_is_scoped_per_phone_number() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let code = db.start_phone_verification(&alice, PHONE).unwrap();
        let err = db
            .confirm_phone_verification(&alice, "+15559876543", &code)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCode));
    }
}
