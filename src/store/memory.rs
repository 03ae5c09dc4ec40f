//! In-process [`FeedStore`] backed by a mutex-guarded table pair.
//!
//! Mirrors the constraints of the SQL schema: unique feed URLs, unique
//! `(feed_id, url)` posts, and posts that must reference an existing feed.

use super::FeedStore;
use crate::error::StoreError;
use crate::models::{Feed, NewPost, Post};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    feeds: Vec<Feed>,
    posts: Vec<Post>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feed that has never been fetched.
    pub fn add_feed(&self, name: &str, url: &str) -> Result<Feed, StoreError> {
        self.insert_feed(name, url, None)
    }

    /// Register a feed with an existing fetch history.
    pub fn insert_feed(
        &self,
        name: &str,
        url: &str,
        last_fetched_at: Option<DateTime<Utc>>,
    ) -> Result<Feed, StoreError> {
        let mut tables = self.lock()?;
        if tables.feeds.iter().any(|feed| feed.url == url) {
            return Err(StoreError::Persistence(format!(
                "feed URL {url:?} is already registered"
            )));
        }

        let now = Utc::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.to_string(),
            url: url.to_string(),
            user_id: None,
            last_fetched_at,
        };
        tables.feeds.push(feed.clone());
        Ok(feed)
    }

    pub fn feed(&self, feed_id: Uuid) -> Option<Feed> {
        let tables = self.lock().ok()?;
        tables.feeds.iter().find(|feed| feed.id == feed_id).cloned()
    }

    /// Posts of one feed in insertion order.
    pub fn posts_for_feed(&self, feed_id: Uuid) -> Vec<Post> {
        match self.lock() {
            Ok(tables) => tables
                .posts
                .iter()
                .filter(|post| post.feed_id == feed_id)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Persistence("memory store lock poisoned".to_string()))
    }
}

impl FeedStore for MemoryStore {
    async fn get_feed_to_fetch(&self) -> Result<Feed, StoreError> {
        let tables = self.lock()?;
        tables
            .feeds
            .iter()
            .min_by_key(|feed| (feed.last_fetched_at, feed.id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("no feeds registered".to_string()))
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let feed = tables
            .feeds
            .iter_mut()
            .find(|feed| feed.id == feed_id)
            .ok_or_else(|| StoreError::NotFound(format!("feed {feed_id}")))?;

        let fetched_at = feed.last_fetched_at.map_or(at, |previous| previous.max(at));
        feed.last_fetched_at = Some(fetched_at);
        feed.updated_at = at;
        debug!(%feed_id, %fetched_at, "Marked feed fetched");
        Ok(())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut tables = self.lock()?;
        if !tables.feeds.iter().any(|feed| feed.id == post.feed_id) {
            return Err(StoreError::NotFound(format!("feed {}", post.feed_id)));
        }
        if tables
            .posts
            .iter()
            .any(|existing| existing.feed_id == post.feed_id && existing.url == post.url)
        {
            return Err(StoreError::DuplicateKey {
                feed_id: post.feed_id,
                url: post.url,
            });
        }

        let now = Utc::now();
        let stored = Post {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            feed_id: post.feed_id,
            url: post.url,
            title: post.title,
            description: post.description,
            published_at: post.published_at,
        };
        tables.posts.push(stored.clone());
        Ok(stored)
    }
}
