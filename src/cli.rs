//! Command-line interface definitions for radgregator.
//!
//! Options can be given as flags or, where noted, environment variables.
//! Subcommands are a plain enum resolved once by clap; there is no runtime
//! command table.

use crate::utils::parse_interval;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// # Examples
///
/// ```sh
/// # Fetch one feed every 30 seconds using the database from ~/.radconfig.json
/// radgregator agg 30s
///
/// # Try it out without a database
/// radgregator agg 1m --memory --feed https://blog.boot.dev/index.xml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the JSON config file (default: ~/.radconfig.json)
    #[arg(short, long, env = "RADGREGATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// PostgreSQL connection URL; overrides `db_url` from the config file
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Keep fetching feeds, one per interval, until interrupted
    Agg {
        /// Time between fetches, e.g. `30s`, `1m`, `1h30m` (minimum 5s)
        #[arg(value_parser = parse_interval)]
        interval: Duration,

        /// Keep feeds and posts in memory instead of PostgreSQL
        #[arg(long)]
        memory: bool,

        /// Feed URL to register before starting; may be repeated
        #[arg(long = "feed", value_name = "URL")]
        feeds: Vec<String>,

        /// Per-request deadline, e.g. `20s`; unset keeps the HTTP client default
        #[arg(long, value_parser = parse_interval)]
        request_timeout: Option<Duration>,
    },
}
