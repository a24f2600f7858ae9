//! # reel-store
//!
//! The authoritative social content store behind the Reel video-sharing
//! client: profiles and roles, video posts with likes and comments, the
//! follow graph, notification fan-out, and phone verification.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed operations for every remote
//! call the client issues. SQLite serializes each statement, so every
//! mutation applies as an indivisible unit per entity; engagement actions
//! (like, follow) are idempotent by construction via composite primary keys.

pub mod database;
pub mod graph;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod verification;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
