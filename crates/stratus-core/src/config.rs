//! Configuration structures for Stratus clients.
//!
//! This module provides configuration types for connecting to the Stratus API, including
//! the project/region scope, task waiting defaults and pagination defaults.

use crate::Error;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for a Stratus client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StratusClientConfig {
    /// API base URL
    #[validate(url)]
    pub api_url: String,

    /// API version path segment (e.g. `v1`)
    #[validate(length(min = 1, max = 8))]
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Project the client operates in
    #[validate(range(min = 1))]
    pub project_id: u64,

    /// Region the client operates in
    #[validate(range(min = 1))]
    pub region_id: u64,

    /// Static API token sent with every request
    #[serde(default, skip_serializing)]
    pub api_token: Option<SecretString>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of retry attempts for idempotent requests
    #[validate(range(min = 0, max = 10))]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Task waiting defaults
    #[validate(nested)]
    #[serde(default)]
    pub task_wait: TaskWaitConfig,

    /// Pagination defaults
    #[validate(nested)]
    #[serde(default)]
    pub pagination: PaginationConfig,
}

fn default_api_version() -> String {
    "v1".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

impl StratusClientConfig {
    /// Create a new client configuration with required parameters.
    ///
    /// # Arguments
    ///
    /// * `api_url` - The API base URL (e.g., "https://api.example.com/cloud")
    /// * `project_id` - Project scope for resource URLs
    /// * `region_id` - Region scope for resource URLs
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(api_url: impl Into<String>, project_id: u64, region_id: u64) -> Result<Self, Error> {
        let config = Self {
            api_url: api_url.into(),
            api_version: default_api_version(),
            project_id,
            region_id,
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            task_wait: TaskWaitConfig::default(),
            pagination: PaginationConfig::default(),
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set the API token.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the API version segment.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set maximum retry attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set task waiting defaults.
    #[must_use]
    pub const fn with_task_wait(mut self, config: TaskWaitConfig) -> Self {
        self.task_wait = config;
        self
    }

    /// Set pagination defaults.
    #[must_use]
    pub const fn with_pagination(mut self, config: PaginationConfig) -> Self {
        self.pagination = config;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse and validate the API URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_api_url(&self) -> Result<Url, Error> {
        Url::parse(&self.api_url).map_err(|e| Error::ConfigError(format!("Invalid API URL: {e}")))
    }
}

/// Defaults for waiting on asynchronous tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TaskWaitConfig {
    /// Whether mutating calls block until their tasks settle
    #[serde(default = "default_wait")]
    pub wait: bool,

    /// Maximum time to wait for a single task, in seconds
    #[validate(range(min = 1, max = 86_400))]
    #[serde(default = "default_wait_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between task polls, in milliseconds
    #[validate(range(min = 10, max = 60_000))]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_wait() -> bool {
    true
}

const fn default_wait_timeout_secs() -> u64 {
    3600
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

impl TaskWaitConfig {
    /// Create a task wait configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            wait: default_wait(),
            timeout_secs: default_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }

    /// Return immediately with task IDs instead of waiting.
    #[must_use]
    pub const fn no_wait(mut self) -> Self {
        self.wait = false;
        self
    }

    /// Set the wait timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Set the poll interval in milliseconds.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, millis: u64) -> Self {
        self.poll_interval_ms = millis;
        self
    }

    /// Get the wait timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the poll interval as a Duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TaskWaitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Defaults for paged list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PaginationConfig {
    /// Page size requested from offset-style endpoints
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_page_limit")]
    pub limit: u32,
}

const fn default_page_limit() -> u32 {
    100
}

impl PaginationConfig {
    /// Create a pagination configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            limit: default_page_limit(),
        }
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self::new()
    }
}
