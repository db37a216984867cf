use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_SIMPLIFY_BASE: &str = "https://api.simplify.jobs";
pub const DEFAULT_CALENDAR_ID: &str = "primary";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub simplify_api_key: Option<String>,
    pub simplify_base: String,
    pub rss_feeds: Vec<String>,
    pub scrapers: Vec<String>,
    pub spreadsheet_id: Option<String>,
    pub calendar_id: String,
    /// Bearer token for the Google Sheets/Calendar REST APIs.
    pub google_access_token: Option<String>,
    pub database_path: PathBuf,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simplify_api_key: None,
            simplify_base: DEFAULT_SIMPLIFY_BASE.to_string(),
            rss_feeds: Vec::new(),
            scrapers: Vec::new(),
            spreadsheet_id: None,
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            google_access_token: None,
            database_path: PathBuf::from("scout.db"),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let http_timeout = match optional_env("SCOUT_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("SCOUT_HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let database_path = match optional_env("SCOUT_DB") {
            Some(path) => PathBuf::from(path),
            None => default_database_path(),
        };

        Ok(Config {
            simplify_api_key: optional_env("SIMPLIFY_API_KEY"),
            simplify_base: optional_env("SIMPLIFY_BASE")
                .unwrap_or_else(|| DEFAULT_SIMPLIFY_BASE.to_string()),
            rss_feeds: split_list(&env::var("RSS_FEEDS").unwrap_or_default()),
            scrapers: split_list(&env::var("SCRAPERS").unwrap_or_default())
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
            spreadsheet_id: optional_env("GOOGLE_SHEETS_SPREADSHEET_ID"),
            calendar_id: optional_env("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
            google_access_token: optional_env("GOOGLE_ACCESS_TOKEN"),
            database_path,
            http_timeout,
        })
    }
}

fn default_database_path() -> PathBuf {
    // XDG data directory, or the working directory as a fallback
    match directories::ProjectDirs::from("", "", "scout") {
        Some(dirs) => dirs.data_dir().join("scout.db"),
        None => PathBuf::from("scout.db"),
    }
}

/// Unset and blank variables are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-delimited list, dropping blanks and repeats.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|seen| seen == item) {
            items.push(item.to_string());
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" https://a.example/feed , ,https://b.example/feed,"),
            vec!["https://a.example/feed", "https://b.example/feed"]
        );
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_split_list_drops_repeats() {
        assert_eq!(split_list("a,b,a"), vec!["a", "b"]);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.simplify_base, "https://api.simplify.jobs");
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.rss_feeds.is_empty());
    }
}
