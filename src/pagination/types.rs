//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::http::RawResponse;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default cap on pages fetched from one list endpoint
pub const DEFAULT_MAX_PAGES: u32 = 200;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available at this URL
    Continue {
        /// Absolute URL of the next page
        url: String,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with a new URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::Continue { url: url.into() }
    }
}

/// Configuration for pagination behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Stop after this many pages even if more are advertised
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl PaginationConfig {
    /// Create a config with a page cap
    pub fn with_max_pages(max_pages: u32) -> Self {
        Self { max_pages }
    }
}

/// Endpoint-specific early stop, evaluated on each page's records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StopCondition {
    /// Only the continuation link or the page cap end pagination
    #[default]
    Never,

    /// Stop when page is empty (no records)
    EmptyPage,

    /// Stop once the last record on a page is older than a cutoff
    ///
    /// A page whose last record has no parseable timestamp also stops
    /// pagination.
    OlderThan {
        /// Record field holding an ISO 8601 timestamp
        field: String,
        /// Maximum age of the last record
        max_age: Duration,
    },
}

impl StopCondition {
    /// Create an age-based stop condition
    pub fn older_than(field: impl Into<String>, max_age: Duration) -> Self {
        Self::OlderThan {
            field: field.into(),
            max_age,
        }
    }

    /// Check this condition against one page of records
    pub fn check(&self, records: &[Value], now: DateTime<Utc>) -> StopResult {
        match self {
            StopCondition::Never => StopResult::Continue,
            StopCondition::EmptyPage => {
                if records.is_empty() {
                    StopResult::Stop
                } else {
                    StopResult::Continue
                }
            }
            StopCondition::OlderThan { field, max_age } => {
                let cutoff = now - *max_age;
                let last = records
                    .last()
                    .and_then(|record| record.get(field))
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp);

                match last {
                    Some(timestamp) if timestamp >= cutoff => StopResult::Continue,
                    _ => StopResult::Stop,
                }
            }
        }
    }
}

/// Parse the timestamp formats the list endpoints emit
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Result of checking a stop condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// Continue pagination
    Continue,
    /// Stop pagination
    Stop,
}

impl StopResult {
    /// Check if we should stop
    pub fn should_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages fetched so far
    pub pages: u32,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record one fetched page
    pub fn add_page(&mut self, records: usize) {
        self.pages += 1;
        self.total_fetched += records as u64;
    }
}

/// Extracts the continuation of a page
pub trait Paginator: Send + Sync {
    /// Inspect a fetched page and decide where the next one lives
    fn next_page(&self, response: &RawResponse, body: &Value, state: &mut PaginationState)
        -> NextPage;
}
