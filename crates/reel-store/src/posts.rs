//! Video post operations: creation, feed reads, likes, and comments.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use reel_shared::constants::{MAX_COMMENT_LEN, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use reel_shared::{BlobRef, NotificationType, Principal};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Comment, VideoPost};
use crate::profiles::parse_principal;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a new video post and return its id.
    pub fn create_video_post(
        &self,
        caller: &Principal,
        title: &str,
        description: &str,
        video_blob: &BlobRef,
    ) -> Result<Uuid> {
        if title.trim().is_empty() {
            return Err(StoreError::Validation("title must not be empty".into()));
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(StoreError::Validation(format!(
                "title too long: {} chars (max {MAX_TITLE_LEN})",
                title.len()
            )));
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(StoreError::Validation(format!(
                "description too long: {} chars (max {MAX_DESCRIPTION_LEN})",
                description.len()
            )));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO posts (id, title, description, creator, video_blob, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                title,
                description,
                caller.as_str(),
                video_blob.as_str(),
                now.to_rfc3339(),
            ],
        )?;

        tracing::info!(id = %id, creator = %caller, "video post created");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All posts, newest first (id as tiebreak so the order is stable),
    /// with likes and comments hydrated.
    pub fn get_all_video_posts(&self) -> Result<Vec<VideoPost>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, description, creator, video_blob, created_at
             FROM posts
             ORDER BY created_at DESC, id ASC",
        )?;

        let rows = stmt.query_map([], row_to_post)?;

        let mut posts = Vec::new();
        for row in rows {
            let mut post = row?;
            post.likes = self.likes_for_post(post.id)?;
            post.comments = self.comments_for_post(post.id)?;
            posts.push(post);
        }
        Ok(posts)
    }

    /// Fetch a single post, or `None` if the id is unknown.
    pub fn get_video_post(&self, id: Uuid) -> Result<Option<VideoPost>> {
        let post = self
            .conn()
            .query_row(
                "SELECT id, title, description, creator, video_blob, created_at
                 FROM posts
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_post,
            )
            .optional()?;

        let Some(mut post) = post else {
            return Ok(None);
        };
        post.likes = self.likes_for_post(post.id)?;
        post.comments = self.comments_for_post(post.id)?;
        Ok(Some(post))
    }

    // ------------------------------------------------------------------
    // Engagement
    // ------------------------------------------------------------------

    /// Record the caller's like on a post. Idempotent: a repeated like is a
    /// no-op. Returns whether the like was newly recorded. Notifies the
    /// creator on a new like unless the caller likes their own post.
    pub fn like_video(&self, caller: &Principal, id: Uuid) -> Result<bool> {
        let (creator, title) = self.post_header(id)?;

        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO post_likes (post_id, principal, created_at)
             VALUES (?1, ?2, ?3)",
            params![id.to_string(), caller.as_str(), Utc::now().to_rfc3339()],
        )?;
        let newly_liked = affected > 0;

        if newly_liked {
            let message = format!("{} liked your video \"{}\"", self.display_name(caller)?, title);
            self.dispatch(&creator, caller, NotificationType::Like, &message)?;
            tracing::debug!(post = %id, by = %caller, "like recorded");
        }

        Ok(newly_liked)
    }

    /// Remove the caller's like from a post. Idempotent; never notifies.
    pub fn unlike_video(&self, caller: &Principal, id: Uuid) -> Result<bool> {
        // Unknown ids still fail with NotFound rather than silently no-op.
        let _ = self.post_header(id)?;

        let affected = self.conn().execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND principal = ?2",
            params![id.to_string(), caller.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Append a comment to a post and return the new comment's id.
    /// Notifies the post creator unless they commented themselves.
    pub fn add_comment(&self, caller: &Principal, id: Uuid, text: &str) -> Result<Uuid> {
        if text.trim().is_empty() {
            return Err(StoreError::Validation("comment must not be empty".into()));
        }
        if text.len() > MAX_COMMENT_LEN {
            return Err(StoreError::Validation(format!(
                "comment too long: {} chars (max {MAX_COMMENT_LEN})",
                text.len()
            )));
        }

        let (creator, title) = self.post_header(id)?;

        let comment_id = Uuid::new_v4();
        self.conn().execute(
            "INSERT INTO comments (id, post_id, author, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                comment_id.to_string(),
                id.to_string(),
                caller.as_str(),
                text,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let message = format!(
            "{} commented on your video \"{}\"",
            self.display_name(caller)?,
            title
        );
        self.dispatch(&creator, caller, NotificationType::Comment, &message)?;

        tracing::debug!(post = %id, comment = %comment_id, by = %caller, "comment added");
        Ok(comment_id)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Creator and title of a post, or [`StoreError::NotFound`].
    fn post_header(&self, id: Uuid) -> Result<(Principal, String)> {
        self.conn()
            .query_row(
                "SELECT creator, title FROM posts WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    let creator = parse_principal(row.get(0)?, 0)?;
                    let title: String = row.get(1)?;
                    Ok((creator, title))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    fn likes_for_post(&self, id: Uuid) -> Result<Vec<Principal>> {
        let mut stmt = self.conn().prepare(
            "SELECT principal FROM post_likes
             WHERE post_id = ?1
             ORDER BY created_at ASC, principal ASC",
        )?;

        let rows = stmt.query_map(params![id.to_string()], |row| parse_principal(row.get(0)?, 0))?;

        let mut likes = Vec::new();
        for row in rows {
            likes.push(row?);
        }
        Ok(likes)
    }

    fn comments_for_post(&self, id: Uuid) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, text, author, created_at FROM comments
             WHERE post_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![id.to_string()], row_to_comment)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`VideoPost`] with empty engagement vectors.
fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoPost> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let description: String = row.get(2)?;
    let creator = parse_principal(row.get(3)?, 3)?;
    let blob_str: String = row.get(4)?;
    let ts_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let video_blob = BlobRef::parse(&blob_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(VideoPost {
        id,
        title,
        description,
        creator,
        video_blob,
        likes: Vec::new(),
        timestamp,
        comments: Vec::new(),
    })
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let id_str: String = row.get(0)?;
    let text: String = row.get(1)?;
    let author = parse_principal(row.get(2)?, 2)?;
    let ts_str: String = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Comment {
        id,
        text,
        author,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_shared::NotificationType;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn principal(text: &str) -> Principal {
        Principal::parse(text).unwrap()
    }

    fn blob(text: &str) -> BlobRef {
        BlobRef::parse(text).unwrap()
    }

    #[test]
    fn create_and_fetch_round_trip() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let id = db
            .create_video_post(&alice, "Hello", "", &blob("blob://v1"))
            .unwrap();

        let post = db.get_video_post(id).unwrap().expect("post should exist");
        assert_eq!(post.title, "Hello");
        assert_eq!(post.description, "");
        assert_eq!(post.creator, alice);
        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());

        assert_eq!(db.get_video_post(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn empty_title_rejected() {
        let (_dir, db) = open_db();
        let err = db
            .create_video_post(&principal("alice"), "  ", "", &blob("blob://v1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(db.get_all_video_posts().unwrap().is_empty());
    }

    #[test]
    fn feed_is_reverse_chronological_and_stable() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let first = db
            .create_video_post(&alice, "first", "", &blob("blob://1"))
            .unwrap();
        let second = db
            .create_video_post(&alice, "second", "", &blob("blob://2"))
            .unwrap();

        // Force distinct timestamps; same-instant inserts tiebreak on id.
        db.conn()
            .execute(
                "UPDATE posts SET created_at = ?1 WHERE id = ?2",
                params!["2024-01-01T00:00:00+00:00", first.to_string()],
            )
            .unwrap();
        db.conn()
            .execute(
                "UPDATE posts SET created_at = ?1 WHERE id = ?2",
                params!["2024-01-02T00:00:00+00:00", second.to_string()],
            )
            .unwrap();

        let feed = db.get_all_video_posts().unwrap();
        assert_eq!(feed[0].id, second);
        assert_eq!(feed[1].id, first);

        let again = db.get_all_video_posts().unwrap();
        assert_eq!(feed, again);
    }

    #[test]
    fn like_is_idempotent_and_notifies_once() {
        let (_dir, db) = open_db();
        let alice = principal("alice");
        let bob = principal("bob");

        let id = db
            .create_video_post(&alice, "Hello", "", &blob("blob://v1"))
            .unwrap();

        assert!(db.like_video(&bob, id).unwrap());
        assert!(!db.like_video(&bob, id).unwrap());

        let post = db.get_video_post(id).unwrap().unwrap();
        assert_eq!(post.likes, vec![bob.clone()]);

        let inbox = db.get_notifications(&alice).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::Like);
        assert!(!inbox[0].is_read);
        assert_eq!(inbox[0].recipient, alice);
    }

    #[test]
    fn self_like_records_no_notification() {
        let (_dir, db) = open_db();
        let alice = principal("alice");

        let id = db
            .create_video_post(&alice, "Hello", "", &blob("blob://v1"))
            .unwrap();
        assert!(db.like_video(&alice, id).unwrap());

        assert_eq!(db.get_video_post(id).unwrap().unwrap().likes.len(), 1);
        assert!(db.get_notifications(&alice).unwrap().is_empty());
    }

    #[test]
    fn unlike_removes_and_is_idempotent() {
        let (_dir, db) = open_db();
        let alice = principal("alice");
        let bob = principal("bob");

        let id = db
            .create_video_post(&alice, "Hello", "", &blob("blob://v1"))
            .unwrap();
        db.like_video(&bob, id).unwrap();

        assert!(db.unlike_video(&bob, id).unwrap());
        assert!(!db.unlike_video(&bob, id).unwrap());
        assert!(db.get_video_post(id).unwrap().unwrap().likes.is_empty());
    }

    #[test]
    fn engagement_on_unknown_post_is_not_found() {
        let (_dir, db) = open_db();
        let bob = principal("bob");
        let id = Uuid::new_v4();

        assert!(matches!(db.like_video(&bob, id), Err(StoreError::NotFound)));
        assert!(matches!(db.unlike_video(&bob, id), Err(StoreError::NotFound)));
        assert!(matches!(
            db.add_comment(&bob, id, "hi"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn comments_append_in_order() {
        let (_dir, db) = open_db();
        let alice = principal("alice");
        let bob = principal("bob");

        let id = db
            .create_video_post(&alice, "Hello", "", &blob("blob://v1"))
            .unwrap();

        let c1 = db.add_comment(&bob, id, "first!").unwrap();
        let c2 = db.add_comment(&alice, id, "thanks").unwrap();
        let c3 = db.add_comment(&bob, id, "nice").unwrap();

        let post = db.get_video_post(id).unwrap().unwrap();
        let ids: Vec<Uuid> = post.comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c1, c2, c3]);
        assert_eq!(post.comments[0].text, "first!");
        assert_eq!(post.comments[1].author, alice);

        // Bob's two comments notified Alice; her own comment did not.
        let inbox = db.get_notifications(&alice).unwrap();
        assert_eq!(inbox.len(), 2);
        assert!(inbox
            .iter()
            .all(|n| n.notification_type == NotificationType::Comment));
    }

    #[test]
    fn empty_comment_rejected() {
        let (_dir, db) = open_db();
        let alice = principal("alice");
        let id = db
            .create_video_post(&alice, "Hello", "", &blob("blob://v1"))
            .unwrap();

        let err = db.add_comment(&alice, id, " \n").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(db.get_video_post(id).unwrap().unwrap().comments.is_empty());
    }

    #[test]
    fn notification_message_uses_username_when_saved() {
        let (_dir, db) = open_db();
        let alice = principal("alice");
        let bob = principal("bob");

        db.save_profile(
            &bob,
            &crate::models::ProfileUpdate {
                username: "Bobby".to_string(),
                bio: String::new(),
                profile_picture: None,
            },
        )
        .unwrap();

        let id = db
            .create_video_post(&alice, "Hello", "", &blob("blob://v1"))
            .unwrap();
        db.like_video(&bob, id).unwrap();

        let inbox = db.get_notifications(&alice).unwrap();
        assert_eq!(inbox[0].message, "Bobby liked your video \"Hello\"");
    }
}
