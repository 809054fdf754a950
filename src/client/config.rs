//! Configuration management for the Fever client

use std::{ops::Range, path::PathBuf, str::FromStr, time::Duration};

use compact_str::{format_compact, CompactString};
use itertools::Itertools;
use md5::{Digest, Md5};

use super::error::{ClientError, Result};
use crate::id::ItemId;

/// Most items a Fever server returns for a single `items` call, and the most
/// ids it accepts in `with_ids`.
pub const FEVER_PAGE_SIZE: u32 = 50;

/// Main configuration for the Fever client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the aggregator, e.g. `https://freshrss.example.net`
    pub base_url: CompactString,
    pub username: CompactString,
    /// API password; FreshRSS keeps it separate from the login password
    pub password: CompactString,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// Request configuration
    pub request: RequestConfig,
    /// Bulk fetch configuration
    pub fetch: FetchConfig,
    /// Debug configuration
    pub debug: DebugConfig,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries for failed requests
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further attempt
    pub retry_delay: Duration,
    /// How the api key and call arguments are sent
    pub method: HttpMethod,
}

/// Paginated bulk fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Items requested per page
    pub page_size: u32,
    /// Random pause between pages, `None` to fetch back to back
    pub page_delay: Option<Range<Duration>>,
    /// Time budget for a whole bulk fetch
    pub timeout: Duration,
    /// Stop once this many items are collected
    pub max_items: Option<usize>,
    pub direction: FetchDirection,
}

/// Debug and logging configuration
#[derive(Debug, Clone)]
pub struct DebugConfig {
    /// Enable debug logging of HTTP responses
    pub log_responses: bool,
    /// Directory for storing debug logs
    pub log_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    /// `api_key` and arguments in the query string
    Get,
    /// `api_key` and arguments in a form body
    #[default]
    Post,
}

/// Order in which a bulk fetch walks item ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchDirection {
    /// Oldest first, paging with `since_id`
    #[default]
    Forward,
    /// Newest first, paging with `max_id`
    Backward,
}

/// Query parameters for fetching items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    /// Only items with a greater id
    pub since_id: Option<ItemId>,
    /// Only items with a smaller id
    pub max_id: Option<ItemId>,
    /// Exactly these items
    pub with_ids: Vec<ItemId>,
}

/// State an item can be marked with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemMark {
    Read,
    Unread,
    Saved,
    Unsaved,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            method: HttpMethod::Post,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: FEVER_PAGE_SIZE,
            page_delay: Some(Duration::from_millis(500)..Duration::from_millis(1500)),
            timeout: Duration::from_secs(300),
            max_items: None,
            direction: FetchDirection::Forward,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_responses: false,
            log_directory: Some(PathBuf::from("fever-logs")),
        }
    }
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(
        base_url: impl Into<CompactString>,
        username: impl Into<CompactString>,
        password: impl Into<CompactString>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            verify_ssl: true,
            request: RequestConfig::default(),
            fetch: FetchConfig::default(),
            debug: DebugConfig::default(),
        }
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Read connection settings from `FEVER_API_HOST`, `FEVER_API_USERNAME`,
    /// `FEVER_API_PASSWORD` and `FEVER_API_VERIFY_SSL`.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Ok(host) = std::env::var("FEVER_API_HOST") {
            builder = builder.base_url(host);
        }
        if let Ok(username) = std::env::var("FEVER_API_USERNAME") {
            builder = builder.username(username);
        }
        if let Ok(password) = std::env::var("FEVER_API_PASSWORD") {
            builder = builder.password(password);
        }
        if let Some(verify) = env_flag("FEVER_API_VERIFY_SSL") {
            builder = builder.verify_ssl(verify);
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::config("Base URL cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::config("Base URL must start with http:// or https://"));
        }

        if self.username.is_empty() {
            return Err(ClientError::config_validation("username", "cannot be empty"));
        }

        if self.password.is_empty() {
            return Err(ClientError::config_validation("password", "cannot be empty"));
        }

        if self.request.timeout.is_zero() {
            return Err(ClientError::config("Timeout must be greater than zero"));
        }

        if self.fetch.page_size == 0 || self.fetch.page_size > FEVER_PAGE_SIZE {
            return Err(ClientError::config_validation(
                "page_size",
                format!("must be between 1 and {FEVER_PAGE_SIZE}"),
            ));
        }

        if let Some(delay) = &self.fetch.page_delay {
            if delay.start > delay.end {
                return Err(ClientError::config_validation(
                    "page_delay",
                    "start must not exceed end",
                ));
            }
        }

        Ok(())
    }

    /// Fever authenticates with `md5("username:password")` in lowercase hex
    pub fn api_key(&self) -> CompactString {
        let digest = Md5::digest(format!("{}:{}", self.username, self.password).as_bytes());
        hex::encode(digest).into()
    }

    /// Full URL of the Fever endpoint
    pub fn endpoint_url(&self) -> CompactString {
        format_compact!("{}/api/fever.php", self.base_url.trim_end_matches('/'))
    }

    /// Set TLS certificate verification
    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Set request configuration
    pub fn with_request(mut self, request: RequestConfig) -> Self {
        self.request = request;
        self
    }

    /// Set bulk fetch configuration
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Set debug configuration
    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = debug;
        self
    }

    /// Enable debug logging
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug.log_responses = enabled;
        self
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<CompactString>,
    username: Option<CompactString>,
    password: Option<CompactString>,
    verify_ssl: Option<bool>,
    request: Option<RequestConfig>,
    fetch: Option<FetchConfig>,
    debug: Option<DebugConfig>,
}

impl ClientConfigBuilder {
    /// Set base URL
    pub fn base_url(mut self, url: impl Into<CompactString>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn username(mut self, username: impl Into<CompactString>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<CompactString>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set TLS certificate verification
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = Some(verify);
        self
    }

    /// Set request configuration
    pub fn request(mut self, request: RequestConfig) -> Self {
        self.request = Some(request);
        self
    }

    /// Set bulk fetch configuration
    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Set debug configuration
    pub fn debug(mut self, debug: DebugConfig) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Enable debug logging
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        let mut debug = self.debug.unwrap_or_default();
        debug.log_responses = enabled;
        self.debug = Some(debug);
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let mut request = self.request.unwrap_or_default();
        request.timeout = timeout;
        self.request = Some(request);
        self
    }

    /// Set maximum number of retries
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        let mut request = self.request.unwrap_or_default();
        request.max_retries = max_retries;
        self.request = Some(request);
        self
    }

    /// Set the delay before the first retry
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        let mut request = self.request.unwrap_or_default();
        request.retry_delay = delay;
        self.request = Some(request);
        self
    }

    /// Set the HTTP method used for calls
    pub fn method(mut self, method: HttpMethod) -> Self {
        let mut request = self.request.unwrap_or_default();
        request.method = method;
        self.request = Some(request);
        self
    }

    /// Set the random pause between bulk fetch pages
    pub fn page_delay(mut self, delay: Option<Range<Duration>>) -> Self {
        let mut fetch = self.fetch.unwrap_or_default();
        fetch.page_delay = delay;
        self.fetch = Some(fetch);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::config("Base URL is required (FEVER_API_HOST)"))?;
        let username = self
            .username
            .ok_or_else(|| ClientError::config("Username is required (FEVER_API_USERNAME)"))?;
        let password = self
            .password
            .ok_or_else(|| ClientError::config("Password is required (FEVER_API_PASSWORD)"))?;

        let config = ClientConfig {
            base_url,
            username,
            password,
            verify_ssl: self.verify_ssl.unwrap_or(true),
            request: self.request.unwrap_or_default(),
            fetch: self.fetch.unwrap_or_default(),
            debug: self.debug.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

impl ItemQuery {
    /// Create a new item query
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_since_id(mut self, since_id: Option<ItemId>) -> Self {
        self.since_id = since_id;
        self
    }

    pub fn with_max_id(mut self, max_id: Option<ItemId>) -> Self {
        self.max_id = max_id;
        self
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.with_ids = ids.into_iter().collect();
        self
    }

    /// Call arguments in wire form
    pub fn to_params(&self) -> Vec<(&'static str, CompactString)> {
        let mut params = Vec::new();

        if let Some(since_id) = self.since_id {
            params.push(("since_id", format_compact!("{since_id}")));
        }

        if let Some(max_id) = self.max_id {
            params.push(("max_id", format_compact!("{max_id}")));
        }

        if !self.with_ids.is_empty() {
            params.push(("with_ids", self.with_ids.iter().join(",").into()));
        }

        params
    }
}

impl ItemMark {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemMark::Read => "read",
            ItemMark::Unread => "unread",
            ItemMark::Saved => "saved",
            ItemMark::Unsaved => "unsaved",
        }
    }
}

impl FromStr for ItemMark {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(ItemMark::Read),
            "unread" => Ok(ItemMark::Unread),
            "saved" | "save" | "starred" => Ok(ItemMark::Saved),
            "unsaved" | "unsave" | "unstarred" => Ok(ItemMark::Unsaved),
            other => Err(ClientError::config_validation(
                "mark",
                format!("unknown state {other:?}, expected read, unread, saved or unsaved"),
            )),
        }
    }
}

/// true/1/yes, case insensitive; `None` when unset
pub fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}
