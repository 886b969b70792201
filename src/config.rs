//! Client configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{GymError, GymResult};
use crate::listing::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TOKEN_PATH: &str = "./.gym-admin/session.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the gym API, including `/api`
    pub api_url: String,
    /// File the session token is persisted to
    pub token_path: PathBuf,
    /// Rows per page for paginated views
    pub page_size: u32,
    /// Per-request timeout. Unset waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the environment, reading `.env` first if present.
    pub fn from_env() -> GymResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset keys take their defaults;
    /// set but unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> GymResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("GYM_API_URL").unwrap_or(defaults.api_url);

        let token_path = lookup("GYM_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.token_path);

        let page_size = match lookup("GYM_PAGE_SIZE") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => return Err(invalid("GYM_PAGE_SIZE", &raw)),
            },
            None => defaults.page_size,
        };

        let request_timeout = match lookup("GYM_REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(invalid("GYM_REQUEST_TIMEOUT_SECS", &raw)),
            },
            None => defaults.request_timeout,
        };

        let log_level = lookup("GYM_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            api_url,
            token_path,
            page_size,
            request_timeout,
            log_level,
        })
    }
}

fn invalid(key: &str, value: &str) -> GymError {
    GymError::InvalidConfig(format!("{key} must be a positive integer, got `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.api_url, "http://localhost:8080/api");
        assert_eq!(config.token_path, PathBuf::from("./.gym-admin/session.json"));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GYM_API_URL", "https://gym.example/api"),
            ("GYM_PAGE_SIZE", "25"),
            ("GYM_REQUEST_TIMEOUT_SECS", "15"),
            ("GYM_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://gym.example/api");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn rejects_bad_numbers() {
        for (key, value) in [
            ("GYM_PAGE_SIZE", "0"),
            ("GYM_PAGE_SIZE", "ten"),
            ("GYM_REQUEST_TIMEOUT_SECS", "-1"),
        ] {
            assert!(matches!(
                Config::from_lookup(lookup(&[(key, value)])),
                Err(GymError::InvalidConfig(_))
            ));
        }
    }
}
