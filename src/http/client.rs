//! HTTP client with bounded retries
//!
//! Provides the retrying transport used by every remote call in the crate:
//! - A fixed number of attempts per request (default 5)
//! - Any transport error or non-2xx status counts as one failed attempt
//! - Optional backoff and rate limiting between attempts
//! - A cancellation token checked before every attempt
//!
//! Running out of attempts is not an error. It is reported as
//! [`FetchOutcome::Exhausted`] so callers can tell "no data because the
//! remote never answered" apart from "the remote answered with nothing".

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::types::{BackoffType, Method};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Attempts made per request unless configured otherwise
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of attempts per request
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::None,
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("nrql-report/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max attempts per request
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: HashMap<String, String>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<Value>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
    /// Override max attempts for this request
    pub max_retries: Option<u32>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set max attempts
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }
}

/// A fully resolved outbound request, as handed to a [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Status, headers and body of one answered request
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Build a response with no headers
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as (lossy) UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Outcome of a retried request
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The remote answered with a 2xx status
    Success(RawResponse),
    /// Every attempt failed
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },
}

impl FetchOutcome {
    /// Check if the request succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Get the response if the request succeeded
    pub fn into_response(self) -> Option<RawResponse> {
        match self {
            Self::Success(response) => Some(response),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Sends a single request, without retrying
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and collect the whole body
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse>;
}

/// [`Transport`] backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport honouring the config's timeout and user agent
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse> {
        let mut req = self
            .client
            .request(request.method.into(), &request.url)
            .timeout(request.timeout);

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if let Some(ref body) = request.body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// HTTP client with bounded retries and optional rate limiting
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
    cancel: CancellationToken,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Create a client over an arbitrary transport
    pub fn with_transport(transport: Arc<dyn Transport>, config: HttpClientConfig) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Self {
            transport,
            config,
            rate_limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with this client
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token checked before each attempt
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<FetchOutcome> {
        self.fetch(Method::GET, url, config).await
    }

    /// Make a POST request with a JSON body
    pub async fn post_json(
        &self,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<FetchOutcome> {
        self.fetch(Method::POST, url, config.json(body)).await
    }

    /// Send a request, retrying failed attempts
    ///
    /// Returns `Err` when cancelled or when the transport fails in a way a
    /// retry cannot fix; running out of attempts yields
    /// [`FetchOutcome::Exhausted`].
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<FetchOutcome> {
        let max_attempts = config.max_retries.unwrap_or(self.config.max_retries).max(1);
        let request = self.build_request(method, url, config);

        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            match self.transport.send(&request).await {
                Ok(response) if response.is_success() => {
                    debug!(
                        "Request succeeded: {:?} {} (attempt {attempt})",
                        request.method, request.url
                    );
                    return Ok(FetchOutcome::Success(response));
                }
                Ok(response) => {
                    last_error = Error::http_status(response.status, response.text()).to_string();
                }
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }

            warn!(
                "Request to {} failed, attempt {attempt}/{max_attempts}: {last_error}",
                request.url
            );

            if attempt < max_attempts {
                let delay = self.calculate_backoff(attempt - 1);
                if !delay.is_zero() {
                    tokio::select! {
                        () = self.cancel.cancelled() => return Err(Error::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(FetchOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    fn build_request(&self, method: Method, url: &str, config: RequestConfig) -> HttpRequest {
        let mut headers = self.config.default_headers.clone();
        headers.extend(config.headers);

        HttpRequest {
            method,
            url: self.build_url(url),
            query: config.query,
            headers,
            body: config.body,
            timeout: config.timeout.unwrap_or(self.config.timeout),
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay after a given (zero-based) failed attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::None => Duration::ZERO,
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
