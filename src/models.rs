//! Data models for feeds, posts and the transient documents of a fetch cycle.
//!
//! Persistent rows:
//! - [`Feed`]: a followed RSS feed and its fetch bookkeeping
//! - [`Post`]: one stored entry of a feed
//!
//! Transient values produced and discarded within a single cycle:
//! - [`RawFeedDocument`] / [`RawItem`]: fields exactly as parsed from the XML
//! - [`NormalizedFeed`] / [`NormalizedItem`]: entity-decoded fields with the
//!   publish date resolved to a timestamp

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A feed registered by some user.
///
/// The URL is unique across all feeds. The ingestion pipeline only ever
/// touches `last_fetched_at` (and `updated_at` with it).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Display name chosen when the feed was added.
    pub name: String,
    pub url: String,
    /// The user who added the feed.
    pub user_id: Option<Uuid>,
    /// `None` until the first fetch attempt.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A stored feed entry. `(feed_id, url)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub feed_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new [`Post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewPost {
    pub fn from_item(feed_id: Uuid, item: &NormalizedItem) -> Self {
        Self {
            feed_id,
            url: item.link.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            published_at: item.published_at,
        }
    }
}

/// An RSS 2.0 channel as parsed from the wire, before any cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedDocument {
    pub title: String,
    pub description: String,
    pub items: Vec<RawItem>,
}

/// A single `<item>` as parsed from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// The `<pubDate>` text, unparsed.
    pub pub_date: String,
}

/// Channel-level fields after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Vec<NormalizedItem>,
}

/// Item fields after normalization. Empty strings are recorded as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub title: Option<String>,
    pub link: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_post_from_item_keeps_fields_apart() {
        let feed_id = Uuid::new_v4();
        let published = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let item = NormalizedItem {
            title: Some("Title".to_string()),
            link: "https://example.com/a".to_string(),
            description: Some("Description".to_string()),
            published_at: Some(published),
        };

        let post = NewPost::from_item(feed_id, &item);

        assert_eq!(post.feed_id, feed_id);
        assert_eq!(post.url, "https://example.com/a");
        assert_eq!(post.title.as_deref(), Some("Title"));
        assert_eq!(post.description.as_deref(), Some("Description"));
        assert_eq!(post.published_at, Some(published));
    }

    #[test]
    fn test_feed_serialization() {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 20, 30, 0).unwrap();
        let feed = Feed {
            id: Uuid::nil(),
            created_at: now,
            updated_at: now,
            name: "Example".to_string(),
            url: "https://example.com/rss".to_string(),
            user_id: None,
            last_fetched_at: None,
        };

        let json = serde_json::to_string(&feed).unwrap();
        assert!(json.contains("https://example.com/rss"));
        assert!(json.contains("\"last_fetched_at\":null"));
    }
}
