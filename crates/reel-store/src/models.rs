//! Domain model structs persisted in the store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the RPC layer. Field names serialize in camelCase to match
//! the client's wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reel_shared::{BlobRef, NotificationType, Principal};

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// The publicly visible profile of a principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub bio: String,
    /// Optional blob reference to the avatar image.
    pub profile_picture: Option<BlobRef>,
}

/// The caller's own profile view. Extends [`UserProfile`] with fields only
/// the owning principal may see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallerProfile {
    pub username: String,
    pub bio: String,
    pub profile_picture: Option<BlobRef>,
    /// The verified phone number, if any.
    pub phone_number: Option<String>,
    pub is_phone_verified: bool,
}

/// Payload for a full profile replace (`saveCallerUserProfile`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: Option<BlobRef>,
}

/// A username search match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchHit {
    pub principal: Principal,
    pub profile: UserProfile,
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// A video post with its engagement state hydrated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoPost {
    /// Unique post identifier.
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// The creating principal, immutable after creation.
    pub creator: Principal,
    /// Opaque blob reference to the video content, immutable.
    pub video_blob: BlobRef,
    /// Principals that liked this post, in like order, no duplicates.
    pub likes: Vec<Principal>,
    /// When the post was created.
    pub timestamp: DateTime<Utc>,
    /// Comments in creation order, append-only.
    pub comments: Vec<Comment>,
}

/// A single comment. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub author: Principal,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// A stored notification. Created only by the store itself as a side effect
/// of another principal's action; clients may only flip `is_read`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub recipient: Principal,
    pub is_read: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
