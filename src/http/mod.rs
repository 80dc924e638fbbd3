//! HTTP client module
//!
//! Provides the retrying transport shared by the query API, the REST list
//! endpoints and the event ingestion sink.
//!
//! # Features
//!
//! - **Bounded Retries**: a fixed number of attempts, then an explicit exhausted outcome
//! - **Pluggable Transport**: reqwest in production, stubs in tests
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Cancellation**: a `CancellationToken` checked between attempts

mod client;
mod rate_limit;

pub use client::{
    FetchOutcome, HttpClient, HttpClientConfig, HttpClientConfigBuilder, HttpRequest,
    RawResponse, ReqwestTransport, RequestConfig, Transport, DEFAULT_MAX_RETRIES,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
