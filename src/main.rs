//! # Newest Feed
//!
//! Watches the Hacker News "newest" listing, stores freshly posted stories
//! in SQLite and pushes each scraped page to websocket subscribers.
//!
//! ## Usage
//!
//! ```sh
//! newest_feed --pages 2
//! ```
//!
//! ## Architecture
//!
//! 1. **Startup**: Load config, open the store, start the websocket server
//! 2. **Initial load**: Clear the store, then fetch, archive and persist pages `1..=N`
//! 3. **Polling**: Every 30 seconds fetch page 1, persist fresh items, broadcast the page
//! 4. **Shutdown**: On `stop` or Ctrl-C cancel polling, close sockets and the store

use clap::Parser;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use newest_feed::bootstrap;
use newest_feed::cli::{Cli, is_stop_command, parse_page_count};
use newest_feed::config::FeedConfig;
use newest_feed::hub::{self, BroadcastHub};
use newest_feed::poll::PollLoop;
use newest_feed::scrapers::hackernews::HackerNews;
use newest_feed::store::ArticleStore;
use newest_feed::utils::ensure_writable_dir;

const PAGES_PROMPT: &str = "Enter number of pages to fetch initially (max 20): ";
const STOP_PROMPT: &str = "Type \"stop\" to end the scraping process: ";

type StdinLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newest_feed starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = FeedConfig::resolve(&args)?;
    info!(
        base_url = %config.base_url,
        listen_addr = %config.listen_addr,
        archive_dir = %config.archive_dir.display(),
        interval_secs = config.poll_interval_secs,
        window_minutes = config.freshness_window_minutes,
        "Configuration resolved"
    );

    // Early check: the initial load must be able to write its archives
    if let Err(e) = ensure_writable_dir(&config.archive_dir).await {
        error!(error = %e, "Archive directory is not writable (fix perms or choose a different path)");
        return Err(e.into());
    }

    let store = ArticleStore::connect(&config.database_url, config.freshness_window_minutes).await?;

    let hub = BroadcastHub::new();
    let listener = TcpListener::bind(config.socket_addr()?).await?;
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(hub::serve(listener, hub.clone(), shutdown.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = run(&args, &config, &store, &hub, &mut lines).await;

    shutdown.cancel();
    match server.await {
        Ok(Ok(())) => info!("WebSocket server stopped"),
        Ok(Err(e)) => error!(error = %e, "WebSocket server failed"),
        Err(e) => error!(error = %e, "WebSocket server task panicked"),
    }
    store.close().await;

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");

    outcome
}

/// Initial load followed by polling until the operator stops it.
#[instrument(level = "info", skip_all)]
async fn run(
    args: &Cli,
    config: &FeedConfig,
    store: &ArticleStore,
    hub: &BroadcastHub,
    lines: &mut StdinLines,
) -> Result<(), Box<dyn Error>> {
    let pages = match args.pages {
        Some(pages) => pages,
        None => {
            prompt(PAGES_PROMPT);
            tokio::select! {
                line = lines.next_line() => match line?.as_deref().and_then(parse_page_count) {
                    Some(pages) => pages,
                    None => {
                        error!("Please enter a valid number between 1 and 20.");
                        return Err("invalid initial page count".into());
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted before the initial load");
                    return Ok(());
                }
            }
        }
    };

    let source = Arc::new(HackerNews::new(&config.base_url, config.request_timeout())?);

    info!(pages, "Starting the scraping task");
    tokio::select! {
        loaded = bootstrap::initial_load(pages, source.as_ref(), store, &config.archive_dir) => {
            let archives = loaded?;
            info!(archives = archives.len(), "Continuing with real-time updates");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted during the initial load");
            return Ok(());
        }
    }

    let poll = PollLoop::new(
        source,
        store.clone(),
        hub.clone(),
        config.poll_page,
        config.poll_interval(),
    );
    poll.start();

    wait_for_stop(lines).await;

    poll.shutdown().await;
    info!("Scraping stopped");

    let stored = store.articles().await?;
    for article in &stored {
        debug!(
            rank = %article.rank,
            title = %article.title,
            site = %article.site,
            link = %article.link,
            author = %article.author,
            score = %article.score,
            posted = %article.posted,
            "Stored article"
        );
    }
    info!(stored = stored.len(), "Articles in store at shutdown");
    Ok(())
}

/// Block until the operator types `stop` or sends Ctrl-C.
///
/// If stdin closes, only Ctrl-C can end the wait.
async fn wait_for_stop(lines: &mut StdinLines) {
    let mut stdin_open = true;
    loop {
        if stdin_open {
            prompt(STOP_PROMPT);
        }
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(text)) if is_stop_command(&text) => {
                    info!("Stop requested");
                    return;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!("stdin closed; waiting for Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin; waiting for Ctrl-C");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Gracefully shutting down...");
                return;
            }
        }
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}
