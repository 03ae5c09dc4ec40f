//! Persistence service used by the ingestion pipeline.
//!
//! The pipeline needs exactly three operations from storage, captured by the
//! [`FeedStore`] trait. Two backends implement it:
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | In-process | [`memory`] | tests, `--memory` runs |
//! | PostgreSQL | [`postgres`] | normal operation |
//!
//! Backends are expected to make `create_post` an atomic
//! "insert if not present" on `(feed_id, url)`.

use crate::error::StoreError;
use crate::models::{Feed, NewPost, Post};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage operations required by the scheduler and the ingestion writer.
pub trait FeedStore {
    /// The feed with the oldest `last_fetched_at`, never-fetched feeds first,
    /// ties broken by feed id.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no feeds are registered.
    async fn get_feed_to_fetch(&self) -> Result<Feed, StoreError>;

    /// Record a fetch attempt at `at`. `last_fetched_at` never moves backwards.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the feed no longer exists.
    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Insert a post.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateKey`] if `(feed_id, url)` is already stored
    /// - [`StoreError::NotFound`] if `feed_id` does not exist
    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;
}
