//! Event ingestion sink
//!
//! Posts rows as custom events, chunked and retried through the HTTP client.

use super::sink::Sink;
use crate::error::{Error, Result};
use crate::http::{FetchOutcome, HttpClient, RequestConfig};
use crate::types::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Default host of the event ingestion endpoint
pub const DEFAULT_INSIGHTS_URL: &str = "https://insights-collector.newrelic.com";

/// Maximum events accepted by one ingestion request
pub const DEFAULT_MAX_EVENTS_PER_BATCH: usize = 1000;

/// Settings for the event ingestion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsConfig {
    #[serde(default = "default_insights_url")]
    pub base_url: String,
    pub account_id: String,
    /// Key sent as `X-Insert-Key`
    pub insert_api_key: String,
    #[serde(default = "default_batch")]
    pub max_events_per_batch: usize,
    /// Timestamp stamped on every event, in epoch milliseconds
    #[serde(default)]
    pub timestamp: Option<i64>,
}

fn default_insights_url() -> String {
    DEFAULT_INSIGHTS_URL.to_string()
}

fn default_batch() -> usize {
    DEFAULT_MAX_EVENTS_PER_BATCH
}

impl InsightsConfig {
    pub fn new(account_id: impl Into<String>, insert_api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_INSIGHTS_URL.to_string(),
            account_id: account_id.into(),
            insert_api_key: insert_api_key.into(),
            max_events_per_batch: DEFAULT_MAX_EVENTS_PER_BATCH,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.max_events_per_batch = size;
        self
    }

    /// Full ingestion URL
    pub fn events_url(&self) -> String {
        format!(
            "{}/v1/accounts/{}/events",
            self.base_url.trim_end_matches('/'),
            self.account_id
        )
    }
}

/// Posts rows to the event ingestion endpoint, using the stream name as the
/// event type
pub struct InsightsSink {
    client: HttpClient,
    config: InsightsConfig,
}

impl InsightsSink {
    pub fn new(client: HttpClient, config: InsightsConfig) -> Result<Self> {
        if config.insert_api_key.is_empty() {
            return Err(Error::missing_field("insert_api_key"));
        }
        if config.max_events_per_batch == 0 {
            return Err(Error::config("max_events_per_batch must be at least 1"));
        }
        Ok(Self { client, config })
    }

    /// Prefix a row with `eventType` and the configured timestamp
    fn to_event(&self, event_type: &str, row: &Row) -> Value {
        let mut event = Row::new();
        event.insert("eventType".to_string(), event_type.into());
        if let Some(timestamp) = self.config.timestamp {
            event.insert("timestamp".to_string(), timestamp.into());
        }
        for (key, value) in row {
            event.insert(key.clone(), value.clone());
        }
        Value::Object(event)
    }
}

#[async_trait]
impl Sink for InsightsSink {
    /// Returns the number of events in batches the endpoint accepted;
    /// batches that exhaust their retries are logged and skipped
    async fn write(&mut self, name: &str, rows: &[Row]) -> Result<usize> {
        let url = self.config.events_url();
        let mut delivered = 0;

        for chunk in rows.chunks(self.config.max_events_per_batch) {
            let events: Vec<Value> = chunk.iter().map(|row| self.to_event(name, row)).collect();
            let request = RequestConfig::new()
                .header("Content-Type", "application/json")
                .header("X-Insert-Key", &self.config.insert_api_key);

            match self.client.post_json(&url, Value::Array(events), request).await? {
                FetchOutcome::Success(_) => {
                    delivered += chunk.len();
                    debug!("Inserted {} {name} events", chunk.len());
                }
                FetchOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        "Dropped {} {name} events after {attempts} attempts: {last_error}",
                        chunk.len()
                    );
                }
            }
        }

        Ok(delivered)
    }
}
