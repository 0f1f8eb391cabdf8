//! Session client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";
pub const DEFAULT_STORE_DIR: &str = ".rmcloud";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Parse { key: &'static str, value: String },
}

/// Runtime configuration for the session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Backend base URL, without a trailing slash.
    pub api_url: String,
    /// Directory holding the persisted session record.
    pub store_dir: PathBuf,
    /// Period between background validity checks.
    pub poll_interval: Duration,
    /// Whole-request timeout for backend calls.
    pub request_timeout: Duration,
    /// TCP connect timeout for backend calls.
    pub connect_timeout: Duration,
    /// Page shown to unauthenticated users.
    pub login_path: String,
    /// Landing page after login when no return URL is pending.
    pub home_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            home_path: DEFAULT_HOME_PATH.to_owned(),
        }
    }
}

impl SessionConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `SESSION_API_URL`: backend base URL, default `http://127.0.0.1:3000/api`
    /// - `SESSION_STORE_DIR`: directory holding the persisted session, default `.rmcloud`
    /// - `SESSION_POLL_INTERVAL_SECS`: validity poll period, default 300 (must be > 0)
    /// - `SESSION_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SESSION_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SESSION_LOGIN_PATH`: default `/login`
    /// - `SESSION_HOME_PATH`: default `/`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] but reads values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let api_url = non_empty("SESSION_API_URL").unwrap_or(defaults.api_url);
        let store_dir = non_empty("SESSION_STORE_DIR").map_or(defaults.store_dir, PathBuf::from);

        let poll_secs = parse_secs(&lookup, "SESSION_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError::Parse { key: "SESSION_POLL_INTERVAL_SECS", value: "0".to_owned() });
        }

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_owned(),
            store_dir,
            poll_interval: Duration::from_secs(poll_secs),
            request_timeout: Duration::from_secs(parse_secs(
                &lookup,
                "SESSION_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            connect_timeout: Duration::from_secs(parse_secs(
                &lookup,
                "SESSION_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?),
            login_path: non_empty("SESSION_LOGIN_PATH").unwrap_or(defaults.login_path),
            home_path: non_empty("SESSION_HOME_PATH").unwrap_or(defaults.home_path),
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::Parse { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
