//! Paginated list fetching
//!
//! Walks a list endpoint page by page on top of the retrying client.

use super::types::{NextPage, PaginationConfig, PaginationState, Paginator, StopCondition};
use crate::error::{Error, Result};
use crate::http::{FetchOutcome, HttpClient, RequestConfig};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Result of walking a list endpoint
#[derive(Debug, Clone)]
pub enum ListOutcome {
    /// Every requested page was fetched
    Complete {
        /// Concatenated result-set entries, in page order
        records: Vec<Value>,
        /// Number of pages fetched
        pages: u32,
    },
    /// A page ran out of attempts; nothing is returned
    Exhausted {
        /// One-based number of the page that failed
        page: u32,
        /// Attempts spent on that page
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },
}

impl ListOutcome {
    /// Check if the listing completed
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Records of a complete listing
    pub fn into_records(self) -> Option<Vec<Value>> {
        match self {
            Self::Complete { records, .. } => Some(records),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Follows continuation links across the pages of a list endpoint
pub struct PaginatedFetcher<'a> {
    client: &'a HttpClient,
    config: PaginationConfig,
    now: DateTime<Utc>,
}

impl<'a> PaginatedFetcher<'a> {
    /// Create a fetcher over a client
    pub fn new(client: &'a HttpClient, config: PaginationConfig) -> Self {
        Self {
            client,
            config,
            now: Utc::now(),
        }
    }

    /// Evaluate age-based stop conditions against a fixed instant
    #[must_use]
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Fetch pages until the continuation runs out, the stop condition
    /// fires, or the page cap is reached
    ///
    /// `request` applies to the first page only; continuation URLs already
    /// carry their own query string. Every page must hold `result_set` as an
    /// array.
    pub async fn fetch_all(
        &self,
        url: &str,
        request: RequestConfig,
        result_set: &str,
        paginator: &dyn Paginator,
        stop: &StopCondition,
    ) -> Result<ListOutcome> {
        let mut state = PaginationState::new();
        let mut records = Vec::new();
        let mut next_url = url.to_string();
        let mut page_request = request.clone();

        loop {
            if self.client.cancellation_token().is_cancelled() {
                return Err(Error::Cancelled);
            }

            let response = match self.client.get(&next_url, page_request).await? {
                FetchOutcome::Success(response) => response,
                FetchOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        "Giving up on {url} at page {}: {last_error}",
                        state.pages + 1
                    );
                    return Ok(ListOutcome::Exhausted {
                        page: state.pages + 1,
                        attempts,
                        last_error,
                    });
                }
            };

            let body: Value = response.json()?;
            let page_records = body
                .get(result_set)
                .and_then(Value::as_array)
                .ok_or_else(|| Error::malformed(result_set))?;

            state.add_page(page_records.len());
            records.extend(page_records.iter().cloned());
            debug!(
                "Fetched page {} of {url} ({} records)",
                state.pages,
                page_records.len()
            );

            if state.pages >= self.config.max_pages {
                debug!("Reached page cap ({}) for {url}", self.config.max_pages);
                break;
            }

            if stop.check(page_records, self.now).should_stop() {
                break;
            }

            match paginator.next_page(&response, &body, &mut state) {
                NextPage::Continue { url } => {
                    next_url = url;
                    page_request = RequestConfig {
                        query: Default::default(),
                        ..request.clone()
                    };
                }
                NextPage::Done => break,
            }
        }

        state.mark_done();
        Ok(ListOutcome::Complete {
            records,
            pages: state.pages,
        })
    }
}
