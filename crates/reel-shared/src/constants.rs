/// Application name
pub const APP_NAME: &str = "Reel";

/// Maximum principal text length (characters)
pub const MAX_PRINCIPAL_LEN: usize = 63;

/// Maximum username length (characters)
pub const MAX_USERNAME_LEN: usize = 50;

/// Maximum profile bio length (characters)
pub const MAX_BIO_LEN: usize = 500;

/// Maximum video post title length (characters)
pub const MAX_TITLE_LEN: usize = 150;

/// Maximum video post description length (characters)
pub const MAX_DESCRIPTION_LEN: usize = 2_000;

/// Maximum comment length (characters)
pub const MAX_COMMENT_LEN: usize = 1_000;

/// Maximum blob reference length (characters)
pub const MAX_BLOB_REF_LEN: usize = 2_048;

/// Maximum username search query length (characters)
pub const MAX_SEARCH_QUERY_LEN: usize = 50;

/// Phone number digit count bounds (E.164-ish, optional leading `+`)
pub const MIN_PHONE_DIGITS: usize = 7;
pub const MAX_PHONE_DIGITS: usize = 15;

/// Verification code length (decimal digits)
pub const VERIFICATION_CODE_LEN: usize = 6;

/// Seconds a pending verification code stays valid
pub const VERIFICATION_CODE_TTL_SECS: i64 = 300;

/// Wrong-code attempts allowed before a pending code is revoked
pub const MAX_VERIFICATION_ATTEMPTS: u32 = 5;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
