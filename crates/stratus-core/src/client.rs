//! HTTP client utilities and retry logic.
//!
//! This module provides the [`ApiTransport`] seam consumed by the pagination engine and
//! the task waiter, plus [`ServiceClient`], the `reqwest`-backed implementation shared by
//! every resource crate.

use crate::config::StratusClientConfig;
use crate::error::{Error, Result};
use crate::tasks::TaskResults;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = concat!("stratus-rust/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Retry settings

/// Default maximum number of retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial retry delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Default maximum retry delay in milliseconds (for exponential backoff)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;

/// Retry policy with exponential backoff.
///
/// Only idempotent requests that fail with a transient error are retried. Pagination and
/// task polling never retry on their own; whatever the transport does is bounded by this
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,

    /// Backoff multiplier (typically 2 for exponential backoff)
    pub backoff_multiplier: u32,
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_multiplier: 2,
        }
    }

    /// Create a retry policy with no retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1,
        }
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate delay for a given attempt number.
    ///
    /// Uses exponential backoff: delay = min(initial_delay * multiplier^(attempt - 1), max_delay)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.saturating_pow(attempt - 1);
        let delay_ms = self.initial_delay.as_millis() as u64 * u64::from(multiplier);
        let delay = Duration::from_millis(delay_ms);

        std::cmp::min(delay, self.max_delay)
    }

    /// Check if retries are enabled.
    #[must_use]
    pub const fn has_retries(&self) -> bool {
        self.max_retries > 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Retry policy
    pub retry_policy: RetryPolicy,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            retry_policy: RetryPolicy::new(),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_compression: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Disable retries.
    #[must_use]
    pub const fn without_retries(mut self) -> Self {
        self.retry_policy = RetryPolicy::no_retry();
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Request/response transport used by the pager and the task waiter.
///
/// Implementations surface non-2xx statuses as typed errors and must map 404 to
/// [`Error::NotFound`]; delete confirmation depends on that distinction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Send a request with an optional JSON body and decode the JSON response.
    ///
    /// An empty response body decodes to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns a transport error for connection failures and non-2xx statuses, or
    /// [`Error::Decode`] if the body is not JSON.
    async fn send_json(&self, method: Method, url: &Url, body: Option<Value>) -> Result<Value>;

    /// Issue a `GET` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiTransport::send_json`].
    async fn get_json(&self, url: &Url) -> Result<Value> {
        self.send_json(Method::GET, url, None).await
    }
}

/// Builder for [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ServiceClientBuilder {
    base_url: Url,
    http_config: ClientConfig,
    token: Option<SecretString>,
    user_agent: String,
}

impl ServiceClientBuilder {
    /// Create a new builder from the provided base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut url = Url::parse(base_url.as_ref()).map_err(|err| {
            Error::ConfigError(format!(
                "Invalid API base URL `{}`: {err}",
                base_url.as_ref()
            ))
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            base_url: url,
            http_config: ClientConfig::new(),
            token: None,
            user_agent: USER_AGENT.to_string(),
        })
    }

    /// Build a client from a validated [`StratusClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the API URL cannot be parsed.
    pub fn from_config(config: &StratusClientConfig) -> Result<Self> {
        let http_config = ClientConfig::new()
            .with_timeout(config.timeout())
            .with_retry_policy(RetryPolicy::new().with_max_retries(config.max_retries));

        let mut builder = Self::new(&config.api_url)?.with_http_config(http_config);
        if let Some(token) = &config.api_token {
            builder.token = Some(token.clone());
        }
        Ok(builder)
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.http_config.retry_policy = retry;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Configure the API token sent in the `Authorization` header.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the underlying HTTP client cannot be built.
    pub fn build(self) -> Result<ServiceClient> {
        let mut builder = ClientBuilder::new()
            .timeout(self.http_config.timeout)
            .user_agent(self.user_agent)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT));

        if !self.http_config.enable_compression {
            builder = builder.no_gzip();
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(ServiceClient {
            http,
            base_url: self.base_url,
            retry_policy: self.http_config.retry_policy,
            token: self.token,
        })
    }
}

/// Asynchronous HTTP client for the Stratus API.
#[derive(Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    retry_policy: RetryPolicy,
    token: Option<SecretString>,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("base_url", &self.base_url.as_str())
            .field("retry_policy", &self.retry_policy)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServiceClient {
    /// Construct directly from a base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is invalid.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        ServiceClientBuilder::new(base_url)?.build()
    }

    /// Access the base URL (always ends with `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Access the retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Send a mutating request and decode the task IDs it spawned.
    ///
    /// # Errors
    ///
    /// Returns a decode error if `body` cannot be serialized or the response does not
    /// list tasks, otherwise any transport error.
    pub async fn submit<B>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> Result<TaskResults>
    where
        B: Serialize + ?Sized,
    {
        let payload = body.map(serde_json::to_value).transpose()?;
        TaskResults::from_body(self.send_json(method, url, payload).await?)
    }

    async fn execute(&self, method: Method, url: &Url, body: Option<&Value>) -> Result<Value> {
        let retryable_method = method.is_idempotent();
        let mut attempt = 0;

        loop {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header("Accept", "application/json");

            if let Some(token) = &self.token {
                request = request.header(
                    "Authorization",
                    format!("APIKey {}", token.expose_secret()),
                );
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            info!(%method, url = %url, attempt, "API request");

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let bytes = response.bytes().await.map_err(|err| {
                        Error::HttpError(format!("Failed to read response body: {err}"))
                    })?;

                    if status.is_success() {
                        return deserialize_body(url, status, &bytes);
                    }

                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    map_status_to_error(status, text)
                }
                Err(err) => Error::from(err),
            };

            let transient = matches!(error, Error::Timeout(_) | Error::ServiceUnavailable(_));
            if !(transient && retryable_method) {
                return Err(error);
            }

            attempt += 1;
            if attempt > self.retry_policy.max_retries {
                warn!(url = %url, attempt, error = %error, "API request failed after retries");
                return Err(error);
            }
            let delay = self.retry_policy.delay_for_attempt(attempt);
            if delay > Duration::from_millis(0) {
                debug!("Retrying API request after {:?}", delay);
                sleep(delay).await;
            }
        }
    }
}

#[async_trait]
impl ApiTransport for ServiceClient {
    async fn send_json(&self, method: Method, url: &Url, body: Option<Value>) -> Result<Value> {
        let result = self.execute(method.clone(), url, body.as_ref()).await;
        if let Err(err) = &result {
            if err.should_log() {
                warn!(%method, url = %url, error = %err, "API request failed");
            } else {
                debug!(%method, url = %url, error = %err, "API request failed");
            }
        }
        result
    }
}

fn deserialize_body(url: &Url, status: StatusCode, bytes: &[u8]) -> Result<Value> {
    if status == StatusCode::NO_CONTENT || bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|err| Error::Decode(format!("Failed to parse response for `{url}`: {err}")))
}

fn map_status_to_error(status: StatusCode, text: String) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(text),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::InvalidRequest(format!("Authentication failed: {text}"))
        }
        StatusCode::CONFLICT => Error::Conflict(text),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::BadRequest(text),
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("API temporarily unavailable: {text}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("API server error {status}: {text}"))
        }
        _ => Error::HttpError(format!("API error {status}: {text}")),
    }
}
