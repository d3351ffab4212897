//! Configuration file parser for ~/.config/newsticker/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use crate::ticker::{FeedSource, MIN_UPDATE_INTERVAL};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Ticker configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Label for error messages ("<name> update failed: ...").
    pub name: String,

    /// RSS/Atom feed to poll.
    pub feed_url: String,

    /// Refresh interval in milliseconds. Values below 60000 are raised to 60000.
    pub update_interval_ms: u64,

    /// Maximum number of items shown. 0 falls back to the default.
    pub max_items: usize,

    /// Text placed between headlines on the ticker line.
    pub separator: String,

    /// Refresh immediately when resuming from suspend.
    pub reload_on_suspend: bool,

    /// Maximum ticker line width in columns. 0 = no truncation.
    pub max_line_width: usize,

    /// Log level used when RUST_LOG is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "News".to_string(),
            feed_url: Self::DEFAULT_FEED_URL.to_string(),
            update_interval_ms: Self::DEFAULT_UPDATE_INTERVAL_MS,
            max_items: Self::DEFAULT_MAX_ITEMS,
            separator: " \u{2022} ".to_string(),
            reload_on_suspend: true,
            max_line_width: 0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    pub const DEFAULT_FEED_URL: &'static str = "https://feeds.bbci.co.uk/news/world/rss.xml";
    pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 10 * 60 * 1000;
    pub const DEFAULT_MAX_ITEMS: usize = 10;

    const KNOWN_KEYS: [&'static str; 8] = [
        "name",
        "feed_url",
        "update_interval_ms",
        "max_items",
        "separator",
        "reload_on_suspend",
        "max_line_width",
        "log_level",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content, path)
    }

    fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(path = %path.display(), feed_url = %config.feed_url, "Loaded configuration");
        Ok(config)
    }

    /// Builds the feed source to schedule, warning about out-of-range values.
    pub fn feed_source(&self) -> FeedSource {
        let max_items = if self.max_items == 0 {
            tracing::warn!(
                fallback = Self::DEFAULT_MAX_ITEMS,
                "max_items must be a positive number, using default"
            );
            Self::DEFAULT_MAX_ITEMS
        } else {
            self.max_items
        };

        if u128::from(self.update_interval_ms) < MIN_UPDATE_INTERVAL.as_millis() {
            tracing::warn!(
                configured_ms = self.update_interval_ms,
                minimum_ms = MIN_UPDATE_INTERVAL.as_millis() as u64,
                "update_interval_ms too low, clamping"
            );
        }

        FeedSource::new(self.feed_url.trim(), max_items, self.update_interval_ms)
            .with_name(self.name.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
