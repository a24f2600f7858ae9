use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BLOB_REF_LEN, MAX_PRINCIPAL_LEN};
use crate::error::{BlobRefError, NotificationTypeError, PrincipalError, RoleError};

// Caller identity = opaque textual principal handed over by the identity
// provider. The store never interprets it beyond equality and ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    /// Parse and validate a principal from its text form.
    ///
    /// Accepted: non-empty, at most [`MAX_PRINCIPAL_LEN`] chars, lowercase
    /// alphanumeric plus `-`.
    pub fn parse(text: &str) -> Result<Self, PrincipalError> {
        if text.is_empty() {
            return Err(PrincipalError::Empty);
        }
        if text.len() > MAX_PRINCIPAL_LEN {
            return Err(PrincipalError::TooLong(text.len()));
        }
        if let Some(c) = text
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
        {
            return Err(PrincipalError::InvalidChar(c));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Principal {
    type Error = PrincipalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Principal> for String {
    fn from(p: Principal) -> Self {
        p.0
    }
}

/// Opaque handle to externally stored binary content (video or image),
/// resolvable to a direct fetch URL. Stored by reference, never inspected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct BlobRef(String);

impl BlobRef {
    pub fn parse(text: &str) -> Result<Self, BlobRefError> {
        if text.is_empty() {
            return Err(BlobRefError::Empty);
        }
        if text.len() > MAX_BLOB_REF_LEN {
            return Err(BlobRefError::TooLong(text.len()));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlobRef {
    type Err = BlobRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobRef {
    type Error = BlobRefError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BlobRef> for String {
    fn from(b: BlobRef) -> Self {
        b.0
    }
}

/// Coarse access-control role. `User` is the default for any authenticated
/// principal; `Guest` is reserved for unauthenticated callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            other => Err(RoleError(other.to_string())),
        }
    }
}

/// Kind of a stored notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Comment,
    Message,
    Follow,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Message => "message",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = NotificationTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "message" => Ok(Self::Message),
            "follow" => Ok(Self::Follow),
            other => Err(NotificationTypeError(other.to_string())),
        }
    }
}
