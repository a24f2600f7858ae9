//! # reel-shared
//!
//! Domain vocabulary shared by the Reel store and server: caller identity,
//! roles, notification kinds, blob references, and the size limits every
//! layer agrees on.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{BlobRefError, NotificationTypeError, PrincipalError, RoleError};
pub use types::{BlobRef, NotificationType, Principal, UserRole};
