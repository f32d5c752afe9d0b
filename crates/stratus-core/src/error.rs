//! Error types for Stratus operations.
//!
//! This module provides the error taxonomy shared by every Stratus crate: transport
//! failures mapped from HTTP status codes, decode failures, and the task-protocol
//! errors raised while waiting for asynchronous operations.

use thiserror::Error;

/// Main error type for Stratus operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// API is unavailable or returned a transient server error
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Invalid resource identifier
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Transport-level timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bad request with details
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Task finished in the `ERROR` state
    #[error("Task {task_id} failed: {detail}")]
    TaskFailed {
        /// Task identifier
        task_id: String,
        /// Server-reported error detail
        detail: String,
    },

    /// Gave up waiting for a task to reach a terminal state
    #[error("Timed out waiting for task {task_id} (last state: {last_state})")]
    TaskTimeout {
        /// Task identifier
        task_id: String,
        /// Last state observed before the deadline
        last_state: String,
    },

    /// Waiting for a task was cancelled by the caller
    #[error("Cancelled while waiting for task {task_id}")]
    Cancelled {
        /// Task identifier
        task_id: String,
    },

    /// Finished task did not report the expected created resource
    #[error("Task {task_id} did not report created resource `{key}`")]
    MissingCreatedResource {
        /// Task identifier
        task_id: String,
        /// Key looked up in `created_resources`
        key: String,
    },

    /// Resource still exists after its delete task finished
    #[error("Resource still exists: {0}")]
    ResourceStillExists(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for Stratus operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Decode(_) => "DECODE_ERROR",
            Self::InvalidId(_) => "INVALID_ID",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::TaskFailed { .. } => "TASK_FAILED",
            Self::TaskTimeout { .. } => "TASK_TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::MissingCreatedResource { .. } => "MISSING_CREATED_RESOURCE",
            Self::ResourceStillExists(_) => "RESOURCE_STILL_EXISTS",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns true for a 404 mapped from the transport.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this error points at a client or server defect rather than an
    /// expected outcome such as a 404, and should be logged at `warn`.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::Decode(_) | Self::InvalidEndpoint(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidId(err.to_string())
    }
}
