use crate::Result;
use crate::harvest::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BASE_DELAY, Endpoints, Fetcher, RegistryClient, RetryPolicy};
use camino::Utf8Path;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// Name of the configuration file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "dephunt.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Attempts per request, including the first one
    pub max_attempts: u32,

    /// Timeout for each individual network call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Unit of the exponential retry backoff
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,

    /// Pause between consecutive discovery page requests
    #[serde(with = "humantime_serde")]
    pub page_delay: Duration,

    /// User agent sent with every request
    pub user_agent: String,

    /// Registry base URLs
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            page_delay: Duration::from_secs(1),
            user_agent: concat!("dephunt/", env!("CARGO_PKG_VERSION")).to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// An explicit path must exist. Without one, `dephunt.toml` in the current
    /// directory is used if present.
    pub fn load(config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path, text)
        } else {
            let path = Utf8Path::new(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config
            .validate()
            .map_err(|e| app_err!("invalid configuration file '{final_path}': {e}"))?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(app_err!("max_attempts must be at least 1"));
        }

        if self.request_timeout.is_zero() {
            return Err(app_err!("request_timeout must be greater than zero"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(app_err!("user_agent must not be empty"));
        }

        Ok(())
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.retry_base_delay,
            timeout: self.request_timeout,
        }
    }

    /// Build the client used to reach every registry
    pub fn registry_client(&self) -> Result<RegistryClient> {
        Ok(RegistryClient {
            fetcher: Fetcher::new(&self.user_agent, self.retry_policy())?,
            endpoints: self.endpoints.clone(),
            page_delay: self.page_delay,
        })
    }
}
