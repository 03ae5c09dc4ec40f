//! Ingestion writer: turns normalized items into stored posts.
//!
//! Every item is inserted on its own. An item already stored for the feed
//! (duplicate key) is a silent no-op, and any other failure is logged and
//! skipped, so one bad row never aborts the batch and re-ingesting the same
//! document is idempotent.
//!
//! A shutdown request stops the writer before its next insert; an insert
//! already in flight is allowed to finish.

use crate::models::{NewPost, NormalizedItem};
use crate::shutdown::Shutdown;
use crate::store::FeedStore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Outcome counts of one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub created: usize,
    /// Items already stored for this feed.
    pub duplicates: usize,
    /// Items skipped because of a persistence failure or a missing link.
    pub failed: usize,
    /// True when shutdown stopped the batch before every item was attempted.
    pub interrupted: bool,
}

#[instrument(level = "info", skip_all, fields(%feed_id, items = items.len()))]
pub async fn ingest<S: FeedStore>(
    store: &S,
    feed_id: Uuid,
    items: &[NormalizedItem],
    shutdown: &Shutdown,
) -> IngestReport {
    let mut report = IngestReport::default();

    for item in items {
        if shutdown.is_requested() {
            warn!(
                remaining = items.len() - (report.created + report.duplicates + report.failed),
                "Shutdown requested; stopping ingestion"
            );
            report.interrupted = true;
            break;
        }

        if item.link.is_empty() {
            warn!(title = ?item.title, "Item has no link; skipping");
            report.failed += 1;
            continue;
        }

        match store.create_post(NewPost::from_item(feed_id, item)).await {
            Ok(post) => {
                debug!(post_id = %post.id, url = %post.url, "Stored post");
                report.created += 1;
            }
            Err(e) if e.is_duplicate_key() => {
                debug!(url = %item.link, "Post already stored");
                report.duplicates += 1;
            }
            Err(e) => {
                warn!(url = %item.link, error = %e, "Failed to store post; skipping");
                report.failed += 1;
            }
        }
    }

    info!(
        created = report.created,
        duplicates = report.duplicates,
        failed = report.failed,
        interrupted = report.interrupted,
        "Ingestion finished"
    );
    report
}
