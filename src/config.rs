//! Configuration for report runs
//!
//! `ReportConfig` is loaded from YAML. Query definitions come from a YAML
//! list, accounts from a CSV file, and API keys from flags or the
//! environment.

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::output::{DEFAULT_INSIGHTS_URL, DEFAULT_MAX_EVENTS_PER_BATCH};
use crate::pagination::PaginationConfig;
use crate::query::{DecodeOptions, DEFAULT_QUERY_URL};
use crate::rest::DEFAULT_REST_URL;
use crate::types::{BackoffType, OptionStringExt, Row, SinkKind, StringMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Report Config
// ============================================================================

/// Complete run configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// API hosts
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// REST listing limits
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Row production options
    #[serde(default)]
    pub decode: DecodeOptions,

    /// Where rows go
    #[serde(default)]
    pub output: OutputConfig,
}

impl ReportConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_file(path, "config")?;
        Self::from_yaml(&content)
    }

    /// Parse a config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ReportConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse config YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.http.max_retries == 0 {
            return Err(Error::config("http.max_retries must be at least 1"));
        }
        if self.pagination.max_pages == 0 {
            return Err(Error::config("pagination.max_pages must be at least 1"));
        }
        if self.output.max_events_per_batch == 0 {
            return Err(Error::config("output.max_events_per_batch must be at least 1"));
        }
        if let Some(limit) = &self.http.rate_limit {
            if limit.requests_per_second == 0 {
                return Err(Error::config("http.rate_limit.requests_per_second must be positive"));
            }
        }
        Ok(())
    }
}

/// API hosts, overridable for proxies and tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_query_url")]
    pub query_url: String,

    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    #[serde(default = "default_insights_url")]
    pub insights_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            query_url: default_query_url(),
            rest_url: default_rest_url(),
            insights_url: default_insights_url(),
        }
    }
}

fn default_query_url() -> String {
    DEFAULT_QUERY_URL.to_string()
}

fn default_rest_url() -> String {
    DEFAULT_REST_URL.to_string()
}

fn default_insights_url() -> String {
    DEFAULT_INSIGHTS_URL.to_string()
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between attempts
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Client-side request rate cap
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffConfig::default(),
            rate_limit: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::None,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    60000
}

impl HttpConfig {
    /// Client configuration for these settings
    pub fn to_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .max_retries(self.max_retries)
            .backoff(
                self.retry_backoff.backoff_type,
                Duration::from_millis(self.retry_backoff.initial_ms),
                Duration::from_millis(self.retry_backoff.max_ms),
            );
        if let Some(limit) = &self.rate_limit {
            builder = builder.rate_limit(limit.clone());
        }
        builder.build()
    }
}

// ============================================================================
// Output Config
// ============================================================================

/// Sink selection and its settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub sink: SinkKind,

    /// Folder for CSV files
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// File for JSON lines; stdout when unset
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Events per ingestion request
    #[serde(default = "default_batch")]
    pub max_events_per_batch: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            dir: default_output_dir(),
            file: None,
            max_events_per_batch: default_batch(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_batch() -> usize {
    DEFAULT_MAX_EVENTS_PER_BATCH
}

// ============================================================================
// Query Definitions
// ============================================================================

/// A named query from a query file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Stream name for the rows this query produces
    pub name: String,

    pub nrql: String,

    /// Values substituted for `{name}` placeholders
    #[serde(default)]
    pub params: StringMap,
}

/// Load query definitions from a YAML (or JSON) list
pub fn load_queries(path: impl AsRef<Path>) -> Result<Vec<QueryDefinition>> {
    let content = read_file(path.as_ref(), "query")?;
    parse_queries(&content)
}

/// Parse and validate query definitions
pub fn parse_queries(yaml: &str) -> Result<Vec<QueryDefinition>> {
    let queries: Vec<QueryDefinition> = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse query file: {e}")))?;

    let mut seen = HashSet::new();
    for query in &queries {
        if query.name.trim().is_empty() {
            return Err(Error::config("Query name cannot be empty"));
        }
        if query.nrql.trim().is_empty() {
            return Err(Error::config(format!("Query '{}' has no nrql", query.name)));
        }
        if !seen.insert(query.name.as_str()) {
            return Err(Error::config(format!("Duplicate query name: {}", query.name)));
        }
    }
    Ok(queries)
}

// ============================================================================
// Accounts
// ============================================================================

/// One row of an accounts file
///
/// Every column whose name does not contain `key` is kept as metadata, in
/// file order. Key columns stay out of the rows; only `query_api_key` is
/// read, as this account's own query key.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub account_id: String,

    /// Overrides the shared query key when set
    pub query_api_key: Option<String>,

    fields: Row,
}

impl Account {
    /// Account with only its id as metadata
    pub fn new(account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        let mut fields = Row::new();
        fields.insert("account_id".to_string(), account_id.clone().into());
        Self {
            account_id,
            query_api_key: None,
            fields,
        }
    }

    /// Display name, empty when the file has no `account_name` column
    pub fn name(&self) -> &str {
        self.fields
            .get("account_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    /// Non-secret fields prepended to every row queried for this account
    pub fn metadata(&self) -> Row {
        self.fields.clone()
    }
}

/// Load accounts from a CSV file with a header row
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<Account>> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::config(format!("Failed to open accounts file '{}': {e}", path.display())))?;
    read_accounts(reader)
}

/// Parse accounts from CSV text
pub fn parse_accounts(content: &str) -> Result<Vec<Account>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    read_accounts(reader)
}

fn read_accounts<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Account>> {
    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == "account_id") {
        return Err(Error::missing_field("account_id"));
    }

    let mut accounts = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut account_id = String::new();
        let mut query_api_key = None;
        let mut fields = Row::new();

        for (column, value) in headers.iter().zip(record.iter()) {
            match column {
                "account_id" => account_id = value.to_string(),
                // empty key cells mean "use the shared key"
                "query_api_key" => query_api_key = Some(value.to_string()).none_if_empty(),
                _ => {}
            }
            if !column.contains("key") {
                fields.insert(column.to_string(), value.into());
            }
        }

        if account_id.is_empty() {
            return Err(Error::missing_field("account_id"));
        }
        accounts.push(Account {
            account_id,
            query_api_key,
            fields,
        });
    }
    Ok(accounts)
}

// ============================================================================
// Credentials
// ============================================================================

pub const ACCOUNT_ID_ENV: &str = "NEW_RELIC_ACCOUNT_ID";
pub const QUERY_API_KEY_ENV: &str = "NEW_RELIC_QUERY_API_KEY";
pub const REST_API_KEY_ENV: &str = "NEW_RELIC_REST_API_KEY";
pub const INSERT_API_KEY_ENV: &str = "NEW_RELIC_INSERT_API_KEY";

/// Account id and API keys for a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub account_id: Option<String>,
    pub query_api_key: Option<String>,
    pub rest_api_key: Option<String>,
    pub insert_api_key: Option<String>,
}

impl Credentials {
    /// Fill unset values from the process environment
    #[must_use]
    pub fn resolve(self) -> Self {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Fill unset values from `lookup`; values already set win
    #[must_use]
    pub fn resolve_with(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |current: Option<String>, name: &str| {
            current
                .none_if_empty()
                .or_else(|| lookup(name).none_if_empty())
        };
        Self {
            account_id: pick(self.account_id, ACCOUNT_ID_ENV),
            query_api_key: pick(self.query_api_key, QUERY_API_KEY_ENV),
            rest_api_key: pick(self.rest_api_key, REST_API_KEY_ENV),
            insert_api_key: pick(self.insert_api_key, INSERT_API_KEY_ENV),
        }
    }

    pub fn require_account_id(&self) -> Result<&str> {
        require(&self.account_id, "account_id")
    }

    pub fn require_query_api_key(&self) -> Result<&str> {
        require(&self.query_api_key, "query_api_key")
    }

    pub fn require_rest_api_key(&self) -> Result<&str> {
        require(&self.rest_api_key, "rest_api_key")
    }

    pub fn require_insert_api_key(&self) -> Result<&str> {
        require(&self.insert_api_key, "insert_api_key")
    }
}

fn require<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| Error::missing_field(field))
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read {what} file '{}': {e}",
            path.display()
        ))
    })
}
