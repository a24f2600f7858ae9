use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("Principal must not be empty")]
    Empty,

    #[error("Principal too long: {0} chars (max {max})", max = crate::constants::MAX_PRINCIPAL_LEN)]
    TooLong(usize),

    #[error("Principal contains invalid character: {0:?}")]
    InvalidChar(char),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobRefError {
    #[error("Blob reference must not be empty")]
    Empty,

    #[error("Blob reference too long: {0} chars (max {max})", max = crate::constants::MAX_BLOB_REF_LEN)]
    TooLong(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown user role: {0:?}")]
pub struct RoleError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown notification type: {0:?}")]
pub struct NotificationTypeError(pub String);
