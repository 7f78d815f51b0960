//! Command-line interface and operator prompts.
//!
//! Flags override values from the optional YAML config file (see
//! [`crate::config`]). The database URL can also come from `DATABASE_URL`.

use clap::Parser;

use crate::bootstrap::check_page_count;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Prompt for the initial page count
/// newest_feed
///
/// # Load three pages up front, poll every 15 seconds
/// newest_feed --pages 3 --interval-secs 15
///
/// # Use a config file and a different database
/// newest_feed -c feed.yaml --database-url sqlite://feed.db?mode=rwc
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Pages to fetch during the initial load (1-20); prompts when omitted
    #[arg(short, long)]
    pub pages: Option<u32>,

    /// Root URL of the listing site
    #[arg(long)]
    pub base_url: Option<String>,

    /// Address for the websocket server
    #[arg(short, long)]
    pub listen: Option<String>,

    /// SQLite connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory for the per-page text archives
    #[arg(short, long)]
    pub archive_dir: Option<String>,

    /// Seconds between poll cycles
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Maximum age in minutes for an item to be stored
    #[arg(long)]
    pub freshness_minutes: Option<i64>,
}

/// Parse the answer to the initial page count prompt.
pub fn parse_page_count(input: &str) -> Option<u32> {
    input
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|n| check_page_count(n).ok())
}

/// Whether an operator line asks to stop.
pub fn is_stop_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("stop")
}
