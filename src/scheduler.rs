//! The feed scheduler: the only long-lived loop of the aggregator.
//!
//! The scheduler is either idle (waiting for the next tick) or running one
//! cycle. The first cycle starts immediately; after that one cycle runs per
//! interval tick. A slow cycle delays the following ticks instead of causing
//! a burst of catch-up cycles.
//!
//! One cycle:
//! 1. select the feed with the oldest `last_fetched_at` (never-fetched first)
//! 2. mark it fetched *before* touching the network, so a feed that keeps
//!    failing rotates to the back of the queue
//! 3. fetch, normalize, write
//!
//! A failed cycle is logged and the loop carries on. Nothing is cached
//! between cycles; every selection reads the store again.

use crate::error::{CycleError, SchedulerError};
use crate::fetcher::FeedFetcher;
use crate::normalizer;
use crate::shutdown::Shutdown;
use crate::store::FeedStore;
use crate::writer::{self, IngestReport};
use chrono::Utc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Shortest accepted interval between cycles.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Reject intervals below [`MIN_INTERVAL`].
pub fn validate_interval(interval: Duration) -> Result<(), SchedulerError> {
    if interval < MIN_INTERVAL {
        return Err(SchedulerError::IntervalTooShort {
            requested: interval,
            minimum: MIN_INTERVAL,
        });
    }
    Ok(())
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_id: Uuid,
    pub feed_name: String,
    pub url: String,
    /// Channel title as published by the feed, if any.
    pub channel_title: Option<String>,
    pub ingest: IngestReport,
}

pub struct Scheduler<S, F> {
    store: S,
    fetcher: F,
    interval: Duration,
}

impl<S, F> Scheduler<S, F>
where
    S: FeedStore,
    F: FeedFetcher,
{
    /// # Errors
    ///
    /// [`SchedulerError::IntervalTooShort`] if `interval` is below [`MIN_INTERVAL`].
    pub fn new(store: S, fetcher: F, interval: Duration) -> Result<Self, SchedulerError> {
        validate_interval(interval)?;
        Ok(Self {
            store,
            fetcher,
            interval,
        })
    }

    /// Stop owning the store, e.g. to inspect it after [`Scheduler::run`].
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run cycles until `shutdown` fires. Shutdown is checked while waiting
    /// for a tick and before and after every cycle.
    #[instrument(level = "info", skip_all, fields(interval = ?self.interval))]
    pub async fn run(&self, shutdown: Shutdown) {
        info!("Scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.requested() => break,
                _ = ticker.tick() => {}
            }
            if shutdown.is_requested() {
                break;
            }

            cycles += 1;
            match self.run_cycle(&shutdown).await {
                Ok(report) => info!(
                    cycle = cycles,
                    feed_id = %report.feed_id,
                    feed = %report.feed_name,
                    url = %report.url,
                    channel = ?report.channel_title,
                    created = report.ingest.created,
                    duplicates = report.ingest.duplicates,
                    failed = report.ingest.failed,
                    "Cycle complete"
                ),
                Err(e) if e.is_no_feeds() => {
                    warn!(cycle = cycles, "No feeds registered; waiting for next tick")
                }
                Err(e) => error!(cycle = cycles, error = %e, "Cycle failed"),
            }

            if shutdown.is_requested() {
                break;
            }
        }

        info!(cycles, "Scheduler stopped");
    }

    /// Run exactly one select → mark → fetch → normalize → write cycle.
    #[instrument(level = "info", skip_all)]
    pub async fn run_cycle(&self, shutdown: &Shutdown) -> Result<CycleReport, CycleError> {
        let feed = self
            .store
            .get_feed_to_fetch()
            .await
            .map_err(CycleError::Select)?;
        info!(feed_id = %feed.id, name = %feed.name, url = %feed.url, "Selected feed");

        self.store
            .mark_feed_fetched(feed.id, Utc::now())
            .await
            .map_err(|source| CycleError::MarkFetched {
                feed_id: feed.id,
                source,
            })?;

        let document = self
            .fetcher
            .fetch(&feed.url, shutdown)
            .await
            .map_err(|source| CycleError::Fetch {
                url: feed.url.clone(),
                source,
            })?;

        let normalized = normalizer::normalize(&document);
        let ingest = writer::ingest(&self.store, feed.id, &normalized.items, shutdown).await;

        Ok(CycleReport {
            feed_id: feed.id,
            feed_name: feed.name,
            url: feed.url,
            channel_title: normalized.title,
            ingest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::{RawFeedDocument, RawItem};
    use crate::shutdown::{self, ShutdownTrigger};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Canned {
        Document(RawFeedDocument),
        NetworkError,
    }

    /// Serves canned responses per URL and records every requested URL.
    #[derive(Default)]
    struct StubFetcher {
        responses: HashMap<String, Canned>,
        calls: Mutex<Vec<String>>,
        trigger_on_fetch: Option<ShutdownTrigger>,
    }

    impl StubFetcher {
        fn with(mut self, url: &str, canned: Canned) -> Self {
            self.responses.insert(url.to_string(), canned);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FeedFetcher for StubFetcher {
        async fn fetch(&self, url: &str, _shutdown: &Shutdown) -> Result<RawFeedDocument, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if let Some(trigger) = &self.trigger_on_fetch {
                trigger.trigger();
            }
            match self.responses.get(url) {
                Some(Canned::Document(doc)) => Ok(doc.clone()),
                Some(Canned::NetworkError) => {
                    Err(FetchError::Network("connection reset".to_string()))
                }
                None => Err(FetchError::Network("no route".to_string())),
            }
        }
    }

    fn document(items: &[(&str, &str)]) -> RawFeedDocument {
        RawFeedDocument {
            title: "Channel".to_string(),
            description: "About".to_string(),
            items: items
                .iter()
                .map(|(title, link)| RawItem {
                    title: title.to_string(),
                    link: link.to_string(),
                    description: "Body".to_string(),
                    pub_date: "Mon, 02 Jan 2006 15:04:05 GMT".to_string(),
                })
                .collect(),
        }
    }

    const A: &str = "https://a.example/rss";
    const B: &str = "https://b.example/rss";

    #[test]
    fn test_rejects_interval_below_minimum() {
        let result = Scheduler::new(
            MemoryStore::new(),
            StubFetcher::default(),
            Duration::from_millis(4_999),
        );
        assert!(matches!(
            result,
            Err(SchedulerError::IntervalTooShort { .. })
        ));

        let scheduler =
            Scheduler::new(MemoryStore::new(), StubFetcher::default(), MIN_INTERVAL).unwrap();
        assert_eq!(scheduler.interval(), MIN_INTERVAL);
    }

    #[tokio::test]
    async fn test_cycle_selects_never_fetched_feed_first() {
        let store = MemoryStore::new();
        let long_ago = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        store.insert_feed("old", B, Some(long_ago)).unwrap();
        let fresh = store.add_feed("fresh", A).unwrap();
        let fetcher = StubFetcher::default().with(A, Canned::Document(document(&[])));
        let scheduler = Scheduler::new(store, fetcher, MIN_INTERVAL).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        let report = scheduler.run_cycle(&shutdown).await.unwrap();

        assert_eq!(report.feed_id, fresh.id);
        assert_eq!(scheduler.fetcher.calls(), vec![A.to_string()]);
    }

    #[tokio::test]
    async fn test_cycle_stores_decoded_posts() {
        let store = MemoryStore::new();
        let feed = store.add_feed("cafes", A).unwrap();
        let fetcher = StubFetcher::default().with(
            A,
            Canned::Document(document(&[("Caf&eacute;", "https://a.example/cafe")])),
        );
        let scheduler = Scheduler::new(store, fetcher, MIN_INTERVAL).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        let report = scheduler.run_cycle(&shutdown).await.unwrap();

        assert_eq!(report.channel_title.as_deref(), Some("Channel"));
        assert_eq!(report.ingest.created, 1);
        let posts = scheduler.store.posts_for_feed(feed.id);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title.as_deref(), Some("Café"));
        assert_eq!(posts[0].description.as_deref(), Some("Body"));
        assert_eq!(
            posts[0].published_at,
            Some(Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap())
        );
    }

    #[tokio::test]
    async fn test_repeated_cycles_do_not_duplicate_posts() {
        let store = MemoryStore::new();
        let feed = store.add_feed("only", A).unwrap();
        let fetcher = StubFetcher::default().with(
            A,
            Canned::Document(document(&[
                ("One", "https://a.example/1"),
                ("Two", "https://a.example/2"),
            ])),
        );
        let scheduler = Scheduler::new(store, fetcher, MIN_INTERVAL).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        scheduler.run_cycle(&shutdown).await.unwrap();
        let second = scheduler.run_cycle(&shutdown).await.unwrap();

        assert_eq!(second.ingest.created, 0);
        assert_eq!(second.ingest.duplicates, 2);
        assert_eq!(scheduler.store.posts_for_feed(feed.id).len(), 2);
    }

    #[tokio::test]
    async fn test_network_failure_still_rotates_feed() {
        let store = MemoryStore::new();
        let long_ago = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let failing = store.add_feed("failing", A).unwrap();
        store.insert_feed("healthy", B, Some(long_ago)).unwrap();
        let fetcher = StubFetcher::default()
            .with(A, Canned::NetworkError)
            .with(B, Canned::Document(document(&[])));
        let scheduler = Scheduler::new(store, fetcher, MIN_INTERVAL).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        let err = scheduler.run_cycle(&shutdown).await.unwrap_err();
        assert!(matches!(
            err,
            CycleError::Fetch {
                source: FetchError::Network(_),
                ..
            }
        ));
        let marked = scheduler.store.feed(failing.id).unwrap().last_fetched_at;
        assert!(marked.is_some_and(|at| at > long_ago));

        scheduler.run_cycle(&shutdown).await.unwrap();
        assert_eq!(scheduler.fetcher.calls(), vec![A.to_string(), B.to_string()]);
    }

    #[tokio::test]
    async fn test_cycle_without_feeds_reports_no_feeds() {
        let scheduler =
            Scheduler::new(MemoryStore::new(), StubFetcher::default(), MIN_INTERVAL).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        let err = scheduler.run_cycle(&shutdown).await.unwrap_err();
        assert!(err.is_no_feeds());
        assert!(scheduler.fetcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_immediately_then_every_interval() {
        let store = MemoryStore::new();
        store.add_feed("a", A).unwrap();
        let long_ago = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        store.insert_feed("b", B, Some(long_ago)).unwrap();
        let fetcher = StubFetcher::default()
            .with(A, Canned::NetworkError)
            .with(B, Canned::Document(document(&[("x", "https://b.example/x")])));
        let scheduler = Scheduler::new(store, fetcher, Duration::from_secs(5)).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        // Ticks at 0s, 5s and 10s fit inside the 12s window.
        let stopped = tokio::time::timeout(Duration::from_secs(12), scheduler.run(shutdown)).await;

        assert!(stopped.is_err(), "scheduler only stops on shutdown");
        assert_eq!(
            scheduler.fetcher.calls(),
            vec![A.to_string(), B.to_string(), A.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_going_when_no_feeds_exist() {
        let scheduler =
            Scheduler::new(MemoryStore::new(), StubFetcher::default(), MIN_INTERVAL).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        let stopped = tokio::time::timeout(Duration::from_secs(11), scheduler.run(shutdown)).await;

        assert!(stopped.is_err());
        assert!(scheduler.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_returns_at_once_when_already_shut_down() {
        let store = MemoryStore::new();
        store.add_feed("a", A).unwrap();
        let scheduler = Scheduler::new(store, StubFetcher::default(), MIN_INTERVAL).unwrap();
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), scheduler.run(shutdown))
            .await
            .unwrap();

        assert!(scheduler.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_during_fetch_prevents_writes() {
        let store = MemoryStore::new();
        let feed = store.add_feed("a", A).unwrap();
        let (trigger, shutdown) = shutdown::channel();
        let fetcher = StubFetcher {
            trigger_on_fetch: Some(trigger),
            ..StubFetcher::default()
        }
        .with(A, Canned::Document(document(&[("x", "https://a.example/x")])));
        let scheduler = Scheduler::new(store, fetcher, MIN_INTERVAL).unwrap();

        tokio::time::timeout(Duration::from_secs(1), scheduler.run(shutdown))
            .await
            .unwrap();

        assert_eq!(scheduler.fetcher.calls(), vec![A.to_string()]);
        assert!(scheduler.store.posts_for_feed(feed.id).is_empty());
        assert!(scheduler.store.feed(feed.id).unwrap().last_fetched_at.is_some());
    }
}
