//! Runtime configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional YAML file, and command-line flags.
//!
//! ```yaml
//! base_url: https://news.ycombinator.com
//! listen_addr: 0.0.0.0:8080
//! database_url: sqlite://newest_feed.db?mode=rwc
//! archive_dir: HackerNews
//! poll_interval_secs: 30
//! poll_page: 1
//! freshness_window_minutes: 5
//! request_timeout_secs: 30
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::poll::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_PAGE};
use crate::recency::DEFAULT_WINDOW_MINUTES;
use crate::scrapers::hackernews::{DEFAULT_BASE_URL, check_page};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Root of the listing site.
    pub base_url: String,
    /// Address the websocket server binds to.
    pub listen_addr: String,
    /// sqlx SQLite connection URL.
    pub database_url: String,
    /// Directory receiving `NewsPage{n}.txt` archives.
    pub archive_dir: PathBuf,
    pub poll_interval_secs: u64,
    /// Page polled by the loop.
    pub poll_page: u32,
    pub freshness_window_minutes: i64,
    pub request_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite://newest_feed.db?mode=rwc".to_string(),
            archive_dir: PathBuf::from("HackerNews"),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            poll_page: DEFAULT_POLL_PAGE,
            freshness_window_minutes: DEFAULT_WINDOW_MINUTES,
            request_timeout_secs: 30,
        }
    }
}

impl FeedConfig {
    /// Read a YAML config file. Missing keys keep their defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        info!("Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Build the effective configuration for a CLI invocation.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(Path::new(path))?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Overlay any flags given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = &cli.base_url {
            self.base_url = v.clone();
        }
        if let Some(v) = &cli.listen {
            self.listen_addr = v.clone();
        }
        if let Some(v) = &cli.database_url {
            self.database_url = v.clone();
        }
        if let Some(v) = &cli.archive_dir {
            self.archive_dir = PathBuf::from(v);
        }
        if let Some(v) = cli.interval_secs {
            self.poll_interval_secs = v;
        }
        if let Some(v) = cli.freshness_minutes {
            self.freshness_window_minutes = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("base_url must not be empty"));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("poll_interval_secs must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs must be positive"));
        }
        if self.freshness_window_minutes < 0 {
            return Err(ConfigError::invalid(
                "freshness_window_minutes must not be negative",
            ));
        }
        check_page(self.poll_page)
            .map_err(|e| ConfigError::invalid(format!("poll_page: {e}")))?;
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|e| ConfigError::invalid(format!("listen_addr {:?}: {e}", self.listen_addr)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
