//! Continuation strategies
//!
//! Each strategy finds the next page of a list endpoint in a different place.

use super::types::{NextPage, PaginationState, Paginator};
use crate::http::RawResponse;
use serde_json::Value;
use url::Url;

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 5988)
///
/// Extracts next page URL from the Link header.
/// Format: `Link: <https://api.newrelic.com/v2/users.json?page=2>; rel="next", ...`
///
/// With a page limit set, a next link whose page number exceeds the limit
/// ends pagination.
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    /// Rel value to follow (default: "next")
    pub rel: String,
    /// Query parameter carrying the page number and its upper bound
    pub page_limit: Option<(String, u32)>,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
            page_limit: None,
        }
    }
}

impl LinkHeaderPaginator {
    /// Create a new link header paginator
    pub fn new(rel: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            page_limit: None,
        }
    }

    /// Refuse links pointing past `max` in the given query parameter
    #[must_use]
    pub fn with_page_limit(mut self, param: impl Into<String>, max: u32) -> Self {
        self.page_limit = Some((param.into(), max));
        self
    }

    fn exceeds_page_limit(&self, url: &str) -> bool {
        let Some((param, max)) = &self.page_limit else {
            return false;
        };
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        parsed
            .query_pairs()
            .find(|(key, _)| key == param)
            .and_then(|(_, value)| value.parse::<u32>().ok())
            .is_some_and(|page| page > *max)
    }
}

impl Paginator for LinkHeaderPaginator {
    fn next_page(
        &self,
        response: &RawResponse,
        _body: &Value,
        state: &mut PaginationState,
    ) -> NextPage {
        if let Some(link_header) = response.header("link") {
            if let Some(next_url) = parse_link_header(link_header, &self.rel) {
                if !self.exceeds_page_limit(&next_url) {
                    return NextPage::with_url(next_url);
                }
            }
        }

        state.mark_done();
        NextPage::Done
    }
}

/// Parse a Link header and extract the URL for the given rel
pub(crate) fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // <url>; rel="next", <url>; rel="last"
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rel = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r == target_rel {
                return Some(u.to_string());
            }
        }
    }

    None
}

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Next URL pagination (URL in response body)
///
/// Follows a dot-separated path such as `links.next` in the JSON body.
#[derive(Debug, Clone)]
pub struct NextUrlPaginator {
    /// Dot-separated path to the next URL
    pub path: String,
}

impl NextUrlPaginator {
    /// Create a new next URL paginator
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Paginator for NextUrlPaginator {
    fn next_page(
        &self,
        _response: &RawResponse,
        body: &Value,
        state: &mut PaginationState,
    ) -> NextPage {
        let next = self
            .path
            .split('.')
            .try_fold(body, |current, part| current.get(part))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty());

        match next {
            Some(url) => NextPage::with_url(url),
            None => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn next_page(
        &self,
        _response: &RawResponse,
        _body: &Value,
        state: &mut PaginationState,
    ) -> NextPage {
        state.mark_done();
        NextPage::Done
    }
}
