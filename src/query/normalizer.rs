//! Query normalizer
//!
//! Submits NRQL to the query endpoint through the retrying client and turns
//! the response into flat rows.

use super::classify::classify;
use super::decoders::Decoder;
use super::header::build_header;
use super::params::render_nrql;
use super::types::{DecodeOptions, Header, ShapeKind};
use crate::error::{Error, Result};
use crate::http::{FetchOutcome, HttpClient, RequestConfig};
use crate::types::{EventSet, Row, StringMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Default host of the query endpoint
pub const DEFAULT_QUERY_URL: &str = "https://insights-api.newrelic.com";

/// A fully decoded response
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub shape: ShapeKind,
    pub header: Header,
    pub rows: EventSet,
}

/// Result of running a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    /// The endpoint answered
    Data(T),
    /// Every attempt failed; distinct from an empty result
    Unavailable { attempts: u32, last_error: String },
}

impl<T> QueryOutcome<T> {
    /// Check if data was returned
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    /// The data, if any
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(data) => Some(data),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Decode a query response into rows that all start with `include`
///
/// Pure: the same response and include map always give the same rows.
pub fn decode_response(response: &Value, include: &Row, options: &DecodeOptions) -> Result<EventSet> {
    Ok(decode(response, include, options)?.rows)
}

/// Decode a query response, keeping its shape and header
pub fn decode(response: &Value, include: &Row, options: &DecodeOptions) -> Result<Decoded> {
    let is_empty = match response {
        Value::Null => true,
        Value::Object(object) => object.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if is_empty {
        return Ok(Decoded {
            shape: ShapeKind::Single,
            header: Header {
                columns: Vec::new(),
                fact_offset: 0,
            },
            rows: Vec::new(),
        });
    }

    let metadata = response
        .get("metadata")
        .ok_or_else(|| Error::malformed("metadata"))?;
    let classification = classify(metadata)?;
    let header = build_header(
        &classification.contents,
        &classification.facet,
        options.collision_policy,
    )?;
    debug!(
        "Classified response as {:?} with {} columns",
        classification.shape,
        header.columns.len()
    );

    let rows = Decoder::new(&classification, &header, metadata, options).decode(response, include)?;

    Ok(Decoded {
        shape: classification.shape,
        header,
        rows,
    })
}

// ============================================================================
// Query Client
// ============================================================================

/// Connection settings for the query endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryApiConfig {
    /// Host of the query endpoint
    #[serde(default = "default_query_url")]
    pub base_url: String,
    /// Account the queries run against
    pub account_id: String,
    /// Query key sent as `X-Query-Key`
    pub query_api_key: String,
}

fn default_query_url() -> String {
    DEFAULT_QUERY_URL.to_string()
}

impl QueryApiConfig {
    /// Create settings for an account
    pub fn new(account_id: impl Into<String>, query_api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_QUERY_URL.to_string(),
            account_id: account_id.into(),
            query_api_key: query_api_key.into(),
        }
    }

    /// Override the endpoint host
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Full query endpoint URL
    pub fn query_url(&self) -> String {
        format!(
            "{}/v1/accounts/{}/query",
            self.base_url.trim_end_matches('/'),
            self.account_id
        )
    }
}

/// Runs NRQL queries and normalizes their results
pub struct QueryClient {
    client: HttpClient,
    config: QueryApiConfig,
    options: DecodeOptions,
}

impl QueryClient {
    /// Create a client with default decode options
    pub fn new(client: HttpClient, config: QueryApiConfig) -> Result<Self> {
        if config.account_id.is_empty() {
            return Err(Error::missing_field("account_id"));
        }
        if config.query_api_key.is_empty() {
            return Err(Error::missing_field("query_api_key"));
        }
        Ok(Self {
            client,
            config,
            options: DecodeOptions::default(),
        })
    }

    /// Use specific decode options
    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Account this client queries
    pub fn account_id(&self) -> &str {
        &self.config.account_id
    }

    /// Decode options in use
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Run a query and return the raw JSON response
    pub async fn query(&self, nrql: &str, params: &StringMap) -> Result<QueryOutcome<Value>> {
        let nrql = render_nrql(nrql, params)?;
        let request = RequestConfig::new()
            .query("nrql", nrql.trim())
            .header("Accept", "application/json")
            .header("X-Query-Key", &self.config.query_api_key);

        match self.client.get(&self.config.query_url(), request).await? {
            FetchOutcome::Success(response) => {
                // an empty body is an empty result
                if response.body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(QueryOutcome::Data(Value::Null));
                }
                Ok(QueryOutcome::Data(response.json()?))
            }
            FetchOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    "Query for account {} unavailable after {attempts} attempts: {last_error}",
                    self.config.account_id
                );
                Ok(QueryOutcome::Unavailable {
                    attempts,
                    last_error,
                })
            }
        }
    }

    /// Run a query and normalize the response into rows
    pub async fn events(
        &self,
        nrql: &str,
        include: &Row,
        params: &StringMap,
    ) -> Result<QueryOutcome<EventSet>> {
        match self.query(nrql, params).await? {
            QueryOutcome::Data(response) => {
                let rows = decode_response(&response, include, &self.options)?;
                info!(
                    "Account {} returned {} rows",
                    self.config.account_id,
                    rows.len()
                );
                Ok(QueryOutcome::Data(rows))
            }
            QueryOutcome::Unavailable {
                attempts,
                last_error,
            } => Ok(QueryOutcome::Unavailable {
                attempts,
                last_error,
            }),
        }
    }
}
