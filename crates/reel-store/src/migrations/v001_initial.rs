//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `profiles`, `roles`, `posts`, `post_likes`,
//! `comments`, `follows`, `notifications`, `verified_phones`, and
//! `phone_verifications`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    principal       TEXT PRIMARY KEY NOT NULL,  -- opaque caller identity
    username        TEXT NOT NULL,
    bio             TEXT NOT NULL DEFAULT '',
    profile_picture TEXT,                       -- nullable blob reference
    created_at      TEXT NOT NULL,              -- ISO-8601 / RFC-3339
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_profiles_username ON profiles(username);

-- ----------------------------------------------------------------
-- Roles (absent row = default "user" for authenticated callers)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS roles (
    principal TEXT PRIMARY KEY NOT NULL,
    role      TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Video posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id          TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    creator     TEXT NOT NULL,                  -- principal, immutable
    video_blob  TEXT NOT NULL,                  -- opaque blob reference
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC, id);

-- ----------------------------------------------------------------
-- Likes (composite PK makes a like idempotent per principal)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS post_likes (
    post_id    TEXT NOT NULL,                   -- FK -> posts(id)
    principal  TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (post_id, principal),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Comments (append-only children of a post)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY NOT NULL,       -- UUID v4
    post_id    TEXT NOT NULL,                   -- FK -> posts(id)
    author     TEXT NOT NULL,                   -- principal
    text       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post_ts ON comments(post_id, created_at, id);

-- ----------------------------------------------------------------
-- Follow edges (composite PK: unique per ordered pair)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS follows (
    follower   TEXT NOT NULL,
    followee   TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (follower, followee)
);

CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,       -- UUID v4
    recipient  TEXT NOT NULL,                   -- principal, immutable
    kind       TEXT NOT NULL,                   -- like|comment|message|follow
    message    TEXT NOT NULL,
    is_read    INTEGER NOT NULL DEFAULT 0,      -- boolean 0/1
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient_ts
    ON notifications(recipient, created_at DESC);

-- ----------------------------------------------------------------
-- Verified phone numbers (separate from profiles: verification
-- survives a full profile replace)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS verified_phones (
    principal    TEXT PRIMARY KEY NOT NULL,
    phone_number TEXT NOT NULL,
    verified_at  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Pending verification codes
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS phone_verifications (
    principal    TEXT NOT NULL,
    phone_number TEXT NOT NULL,
    code         TEXT NOT NULL,
    expires_at   TEXT NOT NULL,
    attempts     INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,

    PRIMARY KEY (principal, phone_number)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
