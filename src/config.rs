use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_BOARD_ID, DEFAULT_SEARCH_TITLE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Forum
    pub base_url: String,
    pub board_id: u32,
    pub search_title: String,

    // Database
    pub database_path: PathBuf,

    // Scraping
    pub fetch_strategy: FetchStrategy,
    pub chrome_path: Option<String>,
    pub request_timeout: Duration,
    pub scrape_interval: Duration,

    // Workers
    pub worker_concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

/// How page HTML is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain GET; fast, but misses script-populated content.
    Http,
    /// Headless Chrome; returns the rendered document.
    Browser,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Forum
            base_url: trim_trailing_slash(&env_or_default("BAHA_BASE_URL", DEFAULT_BASE_URL)),
            board_id: parse_env_u32("BAHA_BOARD_ID", DEFAULT_BOARD_ID)?,
            search_title: env_or_default("SEARCH_TITLE", DEFAULT_SEARCH_TITLE),

            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/baha.sqlite")),

            // Scraping
            fetch_strategy: parse_fetch_strategy(&env_or_default("FETCH_STRATEGY", "http"))?,
            chrome_path: optional_env("CHROME_PATH"),
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),
            scrape_interval: Duration::from_secs(parse_env_u64("SCRAPE_INTERVAL_SECS", 3600)?),

            // Workers
            worker_concurrency: parse_env_usize("WORKER_CONCURRENCY", 4)?,
            max_retries: parse_env_u32("MAX_RETRIES", 3)?,
            retry_backoff: Duration::from_millis(parse_env_u64("RETRY_BACKOFF_MS", 5000)?),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "BAHA_BASE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "BAHA_BASE_URL".to_string(),
                message: format!("not an absolute url: '{}'", self.base_url),
            });
        }
        if self.search_title.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "SEARCH_TITLE".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration for tests: local paths, small intervals, no browser.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            board_id: DEFAULT_BOARD_ID,
            search_title: DEFAULT_SEARCH_TITLE.to_string(),
            database_path: PathBuf::from("./data/test.sqlite"),
            fetch_strategy: FetchStrategy::Http,
            chrome_path: None,
            request_timeout: Duration::from_secs(10),
            scrape_interval: Duration::from_secs(60),
            worker_concurrency: 2,
            max_retries: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }

    /// Title-search endpoint: `B.php?bsn=<board>&qt=1&q=<title>&page=<n>`.
    #[must_use]
    pub fn title_search_url(&self, title: &str, page: u32) -> String {
        format!(
            "{}/B.php?bsn={}&qt=1&q={}&page={page}",
            self.base_url,
            self.board_id,
            urlencoding::encode(title)
        )
    }

    /// User-search endpoint: `Bo.php?bsn=<board>&qt=6&q=<user>&page=<n>`.
    #[must_use]
    pub fn user_search_url(&self, user: &str, page: u32) -> String {
        format!(
            "{}/Bo.php?bsn={}&qt=6&q={}&page={page}",
            self.base_url,
            self.board_id,
            urlencoding::encode(user)
        )
    }

    /// Canonical thread page: `C.php?bsn=<board>&snA=<thread>`.
    #[must_use]
    pub fn thread_url(&self, thread_no: i64) -> String {
        format!(
            "{}/C.php?bsn={}&snA={thread_no}",
            self.base_url, self.board_id
        )
    }

    /// Comment endpoint for one post, optionally continuing from a cursor.
    #[must_use]
    pub fn comment_url(&self, post_no: i64, cursor: Option<&str>) -> String {
        let mut url = format!(
            "{}/ajax/moreCommend.php?bsn={}&snB={post_no}",
            self.base_url, self.board_id
        );
        if let Some(cursor) = cursor {
            url.push_str("&snC=");
            url.push_str(&urlencoding::encode(cursor));
        }
        url
    }
}

fn trim_trailing_slash(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_fetch_strategy(value: &str) -> Result<FetchStrategy, ConfigError> {
    match value.to_lowercase().as_str() {
        "http" => Ok(FetchStrategy::Http),
        "browser" => Ok(FetchStrategy::Browser),
        _ => Err(ConfigError::InvalidValue {
            name: "FETCH_STRATEGY".to_string(),
            message: format!("must be 'http' or 'browser', got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_strategy() {
        assert_eq!(parse_fetch_strategy("http").unwrap(), FetchStrategy::Http);
        assert_eq!(parse_fetch_strategy("HTTP").unwrap(), FetchStrategy::Http);
        assert_eq!(
            parse_fetch_strategy("browser").unwrap(),
            FetchStrategy::Browser
        );
        assert!(parse_fetch_strategy("panther").is_err());
    }

    #[test]
    fn test_endpoint_builders() {
        let config = Config::for_testing();

        assert_eq!(
            config.title_search_url("song", 3),
            "https://forum.gamer.com.tw/B.php?bsn=60076&qt=1&q=song&page=3"
        );
        assert_eq!(
            config.user_search_url("foobar666", 1),
            "https://forum.gamer.com.tw/Bo.php?bsn=60076&qt=6&q=foobar666&page=1"
        );
        assert_eq!(
            config.thread_url(6004847),
            "https://forum.gamer.com.tw/C.php?bsn=60076&snA=6004847"
        );
        assert_eq!(
            config.comment_url(80190131, None),
            "https://forum.gamer.com.tw/ajax/moreCommend.php?bsn=60076&snB=80190131"
        );
        assert_eq!(
            config.comment_url(80190131, Some("15")),
            "https://forum.gamer.com.tw/ajax/moreCommend.php?bsn=60076&snB=80190131&snC=15"
        );
    }

    #[test]
    fn test_title_is_query_encoded() {
        let config = Config::for_testing();
        let url = config.title_search_url("半夜歌串", 1);
        assert!(url.contains("q=%E5%8D%8A%E5%A4%9C%E6%AD%8C%E4%B8%B2"));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = Config {
            worker_concurrency: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_base_url() {
        let config = Config {
            base_url: "forum.gamer.com.tw".to_string(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
