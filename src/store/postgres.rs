//! PostgreSQL [`FeedStore`] using `sqlx`.
//!
//! Schema lives in `migrations/`. Constraint violations are mapped back onto
//! the store error taxonomy:
//! - unique violation (SQLSTATE 23505) on `posts (feed_id, url)` → [`StoreError::DuplicateKey`]
//! - foreign-key violation (SQLSTATE 23503) on `posts.feed_id` → [`StoreError::NotFound`]

use super::FeedStore;
use crate::error::StoreError;
use crate::models::{Feed, NewPost, Post};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    #[instrument(level = "info", skip_all)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .map_err(persistence)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Persistence(format!("migration failed: {e}")))?;

        info!("Connected to database and applied migrations");
        Ok(Self::new(pool))
    }

    /// Register a feed that has never been fetched.
    pub async fn add_feed(&self, name: &str, url: &str) -> Result<Feed, StoreError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO feeds (id, created_at, updated_at, name, url) \
             VALUES ($1, $2, $2, $3, $4) \
             RETURNING {FEED_COLUMNS}"
        );

        sqlx::query_as::<_, Feed>(&query)
            .bind(Uuid::new_v4())
            .bind(now)
            .bind(name)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(persistence)
    }
}

impl FeedStore for PgStore {
    async fn get_feed_to_fetch(&self) -> Result<Feed, StoreError> {
        let query = format!(
            "SELECT {FEED_COLUMNS} FROM feeds \
             ORDER BY last_fetched_at ASC NULLS FIRST, id ASC \
             LIMIT 1"
        );

        sqlx::query_as::<_, Feed>(&query)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?
            .ok_or_else(|| StoreError::NotFound("no feeds registered".to_string()))
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = GREATEST(COALESCE(last_fetched_at, $2), $2),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(feed_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("feed {feed_id}")));
        }
        debug!(%feed_id, "Marked feed fetched");
        Ok(())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, created_at, updated_at, feed_id, url, title, description, published_at)
            VALUES ($1, $2, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at, updated_at, feed_id, url, title, description, published_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(post.feed_id)
        .bind(&post.url)
        .bind(&post.title)
        .bind(&post.description)
        .bind(post.published_at)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateKey {
                    feed_id: post.feed_id,
                    url: post.url,
                })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                Err(StoreError::NotFound(format!("feed {}", post.feed_id)))
            }
            Err(e) => Err(persistence(e)),
        }
    }
}

fn persistence(error: sqlx::Error) -> StoreError {
    StoreError::Persistence(error.to_string())
}
