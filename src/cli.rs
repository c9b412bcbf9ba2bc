//! Command-line interface parsing for Dessert Cookbook
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the [`AppConfig`] the application is started with.

use chrono::Weekday;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{RefreshPolicy, DEFAULT_IMAGE_TIMEOUT};
use crate::data::mealdb::{DEFAULT_REQUEST_TIMEOUT, MEALDB_BASE_URL};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The refresh day is not a weekday name
    #[error("Invalid refresh day: '{0}'. Use a weekday such as mon, tuesday or Sun")]
    InvalidRefreshDay(String),

    /// Prefetch concurrency must allow at least one request
    #[error("Invalid prefetch concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),
}

/// Dessert Cookbook - Browse dessert recipes, bookmark favorites and cache their images
#[derive(Parser, Debug)]
#[command(name = "dessert-cookbook")]
#[command(about = "Browse dessert recipes, bookmark favorites and cache their images")]
#[command(version)]
pub struct Cli {
    /// Directory for bookmarks, settings and the image cache
    ///
    /// Defaults to the platform data and cache directories.
    #[arg(long, global = true, env = "DESSERT_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of TheMealDB API
    #[arg(long, global = true, env = "DESSERT_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Day of the week on which the image cache is flushed
    #[arg(long, global = true, value_name = "WEEKDAY", default_value = "mon")]
    pub refresh_day: String,

    /// Maximum number of images downloaded at once when prefetching
    #[arg(long, global = true, value_name = "N", default_value_t = 4)]
    pub concurrency: usize,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List all desserts, marking bookmarked ones
    List {
        /// Download every dessert thumbnail into the image cache
        #[arg(long)]
        prefetch_images: bool,
    },

    /// Show the recipe for a dessert
    Show {
        /// Dessert id, e.g. 53049
        id: String,
    },

    /// Bookmark a dessert, or remove it if already bookmarked
    Bookmark {
        /// Dessert id, e.g. 53049
        id: String,
    },

    /// List bookmarked desserts
    Bookmarks,

    /// Load an image through the image cache
    Image {
        /// Image URL
        url: String,

        /// Write the image bytes to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Inspect or refresh the image cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Image cache maintenance commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
    /// Show the number of cached images and the last refresh time
    Status,

    /// Flush the cache if today is the refresh day and it has not been flushed today
    Refresh,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Overrides the platform data and cache directories
    pub data_dir: Option<PathBuf>,
    /// Base URL of TheMealDB API
    pub api_base_url: String,
    /// Timeout for recipe requests
    pub request_timeout: Duration,
    /// Timeout for image downloads
    pub image_timeout: Duration,
    /// Image cache purge schedule
    pub refresh_policy: RefreshPolicy,
    /// Maximum concurrent image downloads when prefetching
    pub prefetch_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            api_base_url: MEALDB_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
            refresh_policy: RefreshPolicy::default(),
            prefetch_concurrency: 4,
        }
    }
}

/// Parses a weekday argument such as `mon` or `Monday`
pub fn parse_refresh_day(s: &str) -> Result<Weekday, CliError> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| CliError::InvalidRefreshDay(s.to_string()))
}

impl AppConfig {
    /// Creates an AppConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(AppConfig)` with appropriate settings
    /// * `Err(CliError)` if an argument has an invalid value
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let refresh_day = parse_refresh_day(&cli.refresh_day)?;
        if cli.concurrency == 0 {
            return Err(CliError::InvalidConcurrency(cli.concurrency));
        }

        let defaults = AppConfig::default();
        Ok(AppConfig {
            data_dir: cli.data_dir.clone(),
            api_base_url: cli.api_url.clone().unwrap_or(defaults.api_base_url),
            refresh_policy: RefreshPolicy::weekly(refresh_day),
            prefetch_concurrency: cli.concurrency,
            ..defaults
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refresh_day_accepts_short_and_long_names() {
        assert_eq!(parse_refresh_day("mon").unwrap(), Weekday::Mon);
        assert_eq!(parse_refresh_day("Monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_refresh_day("FRI").unwrap(), Weekday::Fri);
        assert_eq!(parse_refresh_day(" sunday ").unwrap(), Weekday::Sun);
    }

    #[test]
    fn test_parse_refresh_day_invalid() {
        let result = parse_refresh_day("someday");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid refresh day"));
        assert!(err.to_string().contains("someday"));
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert!(config.data_dir.is_none());
        assert_eq!(config.api_base_url, MEALDB_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.image_timeout, Duration::from_secs(5));
        assert_eq!(config.refresh_policy.refresh_day(), Weekday::Mon);
        assert_eq!(config.prefetch_concurrency, 4);
    }

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::parse_from(["dessert-cookbook", "list"]);
        assert_eq!(
            cli.command,
            Command::List {
                prefetch_images: false
            }
        );
        assert_eq!(cli.refresh_day, "mon");
    }

    #[test]
    fn test_cli_parse_list_with_prefetch() {
        let cli = Cli::parse_from(["dessert-cookbook", "list", "--prefetch-images"]);
        assert_eq!(
            cli.command,
            Command::List {
                prefetch_images: true
            }
        );
    }

    #[test]
    fn test_cli_parse_bookmark_with_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "dessert-cookbook",
            "bookmark",
            "53049",
            "--data-dir",
            "/tmp/desserts",
        ]);
        assert_eq!(
            cli.command,
            Command::Bookmark {
                id: "53049".to_string()
            }
        );
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/desserts")));
    }

    #[test]
    fn test_cli_parse_image_with_output() {
        let cli = Cli::parse_from([
            "dessert-cookbook",
            "image",
            "https://example.com/a.jpg",
            "-o",
            "a.jpg",
        ]);
        assert_eq!(
            cli.command,
            Command::Image {
                url: "https://example.com/a.jpg".to_string(),
                output: Some(PathBuf::from("a.jpg")),
            }
        );
    }

    #[test]
    fn test_cli_parse_cache_subcommands() {
        let cli = Cli::parse_from(["dessert-cookbook", "cache", "status"]);
        assert_eq!(cli.command, Command::Cache(CacheCommand::Status));

        let cli = Cli::parse_from(["dessert-cookbook", "cache", "refresh"]);
        assert_eq!(cli.command, Command::Cache(CacheCommand::Refresh));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["dessert-cookbook"]).is_err());
    }

    #[test]
    fn test_app_config_from_cli() {
        let cli = Cli::parse_from([
            "dessert-cookbook",
            "--api-url",
            "http://localhost:9999",
            "--refresh-day",
            "wed",
            "--concurrency",
            "8",
            "bookmarks",
        ]);
        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9999");
        assert_eq!(config.refresh_policy.refresh_day(), Weekday::Wed);
        assert_eq!(config.prefetch_concurrency, 8);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_app_config_from_cli_invalid_refresh_day() {
        let cli = Cli::parse_from(["dessert-cookbook", "--refresh-day", "later", "bookmarks"]);
        assert!(AppConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn test_app_config_from_cli_zero_concurrency() {
        let cli = Cli::parse_from(["dessert-cookbook", "--concurrency", "0", "bookmarks"]);
        let result = AppConfig::from_cli(&cli);
        assert!(matches!(result, Err(CliError::InvalidConcurrency(0))));
    }
}
