//! Error types for Fever client operations

use std::time::Duration;

use compact_str::CompactString;
use thiserror::Error;

/// Structured error types for Fever client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error with endpoint context
    #[error("Failed to parse JSON response from {endpoint}: {message}")]
    JsonParse {
        endpoint: String,
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Server answered with a non-success HTTP status
    #[error("Fever API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: CompactString,
        retry_after: Option<Duration>,
    },

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration field validation failed
    #[error("Invalid {field}: {message}")]
    ConfigValidation { field: String, message: String },

    /// The server rejected the api key
    #[error("Authentication failed")]
    Authentication,

    /// Fever endpoint not found, usually a wrong host or the API is disabled
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    /// Network timeout
    #[error("Request timeout")]
    Timeout,

    /// Every attempt of a retried request failed
    #[error("Request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Create a JSON parsing error with endpoint context
    pub fn json_parse(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            endpoint: endpoint.into(),
            message: source.to_string(),
            source,
        }
    }

    /// Create an API error from a non-success status
    pub fn api(status: u16, message: impl Into<CompactString>) -> Self {
        Self::Api { status, message: message.into(), retry_after: None }
    }

    /// Attach the server's `Retry-After` to a 5xx error
    pub fn with_retry_after(self, delay: Option<Duration>) -> Self {
        match self {
            Self::Api { status, message, .. } => Self::Api { status, message, retry_after: delay },
            other => other,
        }
    }

    /// Classify a transport failure, timeouts get their own variant
    pub fn transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(error)
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a configuration field validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation { field: field.into(), message: message.into() }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a rate limit error
    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        Self::RateLimit { retry_after }
    }

    /// Wrap the last error of a request that ran out of attempts
    pub fn retries_exhausted(attempts: u32, last: ClientError) -> Self {
        Self::RetriesExhausted { attempts, source: Box::new(last) }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::Api { status, .. } => *status >= 500,
            ClientError::Timeout => true,
            ClientError::RateLimit { .. } => true,
            _ => false,
        }
    }

    /// Check if this error indicates a temporary network issue
    pub fn is_network_error(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ClientError::Timeout => true,
            ClientError::RetriesExhausted { source, .. } => source.is_network_error(),
            _ => false,
        }
    }

    /// Delay requested by the server before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::RateLimit { retry_after } | ClientError::Api { retry_after, .. } => {
                *retry_after
            },
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
