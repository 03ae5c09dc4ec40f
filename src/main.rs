//! # radgregator
//!
//! A personal RSS aggregator. Users follow feeds; this binary is the
//! long-running ingestion side that keeps their posts up to date.
//!
//! ## Usage
//!
//! ```sh
//! radgregator agg 30s
//! radgregator agg 1m --memory --feed https://blog.boot.dev/index.xml
//! ```
//!
//! ## Architecture
//!
//! Every interval the scheduler runs one cycle:
//! 1. **Select**: the feed fetched longest ago (never-fetched feeds first)
//! 2. **Mark**: record the attempt before any network I/O
//! 3. **Fetch**: one HTTP GET, parsed as RSS 2.0
//! 4. **Normalize**: decode HTML entities, resolve publish dates
//! 5. **Write**: store each item as a post, skipping ones already stored

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod error;
mod fetcher;
mod models;
mod normalizer;
mod scheduler;
mod shutdown;
mod store;
mod utils;
mod writer;

use cli::{Cli, Command};
use config::Config;
use fetcher::HttpFetcher;
use scheduler::Scheduler;
use shutdown::{Shutdown, ShutdownTrigger};
use store::{FeedStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(command = ?args.command, "Parsed CLI arguments");

    match args.command {
        Command::Agg {
            interval,
            memory,
            feeds,
            request_timeout,
        } => {
            // Reject bad intervals before touching the database or network.
            scheduler::validate_interval(interval)?;

            let fetcher = HttpFetcher::new(request_timeout)?;
            let (trigger, shutdown) = shutdown::channel();
            listen_for_ctrl_c(trigger);

            if memory {
                let store = MemoryStore::new();
                let mut registered = Vec::new();
                for url in &feeds {
                    match store.add_feed(url, url) {
                        Ok(feed) => {
                            info!(feed_id = %feed.id, %url, "Registered feed");
                            registered.push(feed.id);
                        }
                        Err(e) => warn!(%url, error = %e, "Could not register feed"),
                    }
                }

                // Memory mode keeps nothing after exit.
                let store = aggregate(store, fetcher, interval, shutdown).await?;
                for feed_id in registered {
                    if let Some(feed) = store.feed(feed_id) {
                        info!(
                            url = %feed.url,
                            posts = store.posts_for_feed(feed_id).len(),
                            last_fetched_at = ?feed.last_fetched_at,
                            "Feed summary"
                        );
                    }
                }
                Ok(())
            } else {
                let config = Config::load_or_default(args.config.as_deref())?;
                if let Some(user) = &config.current_user_name {
                    info!(%user, "Loaded configuration");
                }
                let database_url = config.database_url(args.database_url.as_deref())?;
                let store = PgStore::connect(&database_url).await?;
                for url in &feeds {
                    match store.add_feed(url, url).await {
                        Ok(feed) => info!(feed_id = %feed.id, %url, "Registered feed"),
                        Err(e) => warn!(%url, error = %e, "Could not register feed"),
                    }
                }
                aggregate(store, fetcher, interval, shutdown).await?;
                Ok(())
            }
        }
    }
}

#[instrument(level = "info", skip_all, fields(?interval))]
async fn aggregate<S: FeedStore>(
    store: S,
    fetcher: HttpFetcher,
    interval: Duration,
    shutdown: Shutdown,
) -> Result<S, Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    let scheduler = Scheduler::new(store, fetcher, interval)?;
    info!("Collecting feeds every {:?}", scheduler.interval());

    scheduler.run(shutdown).await;

    let elapsed = start_time.elapsed();
    info!(secs = elapsed.as_secs(), "Aggregator exiting");
    Ok(scheduler.into_store())
}

fn listen_for_ctrl_c(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c; only a kill will stop the aggregator");
            // Dropping the trigger would read as a shutdown request.
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        trigger.trigger();
    });
}
