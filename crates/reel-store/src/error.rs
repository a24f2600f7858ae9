use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The referenced entity does not exist.
    #[error("Record not found")]
    NotFound,

    /// A required field is empty, oversized, or otherwise malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller is not allowed to perform this operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The supplied verification code does not match the pending one.
    #[error("Invalid verification code")]
    InvalidCode,

    /// The pending verification code has expired.
    #[error("Verification code expired")]
    CodeExpired,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
