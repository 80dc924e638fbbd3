//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::{
    load_accounts, load_queries, Account, Credentials, QueryDefinition, ReportConfig,
};
use crate::error::{Error, Result, ResultExt};
use crate::http::HttpClient;
use crate::output::{CsvSink, InsightsConfig, InsightsSink, JsonSink, Sink};
use crate::pagination::ListOutcome;
use crate::query::{QueryApiConfig, QueryClient, QueryOutcome};
use crate::rest::{list_endpoints, RestApiConfig, RestClient};
use crate::types::{Row, SinkKind, StringMap};
use serde_json::{json, Value};
use std::fs::File;
use std::io::BufWriter;
use tracing::{error, info, warn};

/// Totals for a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Queries that returned data (possibly zero rows)
    pub succeeded: usize,
    /// Queries whose transport exhausted its retries
    pub unavailable: usize,
    /// Queries that failed to render or decode
    pub failed: usize,
    /// Rows accepted by the sink
    pub rows_written: usize,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;
        let credentials = Credentials::from(self.cli.credentials.clone()).resolve();

        match &self.cli.command {
            Commands::Query {
                nrql,
                params,
                name,
            } => {
                let params: StringMap = params.iter().cloned().collect();
                self.query(&config, &credentials, name, nrql, &params).await
            }
            Commands::Batch { queries, accounts } => {
                let queries = load_queries(queries)?;
                let accounts = match accounts {
                    Some(path) => load_accounts(path)?,
                    None => vec![Account::new(credentials.require_account_id()?)],
                };

                let mut sink = build_sink(&config, &credentials)?;
                let summary =
                    run_batch(&config, &credentials, &accounts, &queries, sink.as_mut()).await?;
                info!(
                    "Batch done: {} succeeded, {} unavailable, {} failed, {} rows",
                    summary.succeeded, summary.unavailable, summary.failed, summary.rows_written
                );
                Ok(())
            }
            Commands::List {
                endpoint,
                entity_id,
            } => match endpoint {
                Some(endpoint) => {
                    self.list(&config, &credentials, endpoint, entity_id.as_deref())
                        .await
                }
                None => {
                    println!("{}", serde_json::to_string_pretty(&catalog_json())?);
                    Ok(())
                }
            },
        }
    }

    /// Load the config file, then apply flag overrides
    fn load_config(&self) -> Result<ReportConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ReportConfig::load(path)?,
            None => ReportConfig::default(),
        };
        if let Some(sink) = self.cli.sink {
            config.output.sink = sink.into();
        }
        if let Some(dir) = &self.cli.output {
            config.output.dir = dir.clone();
        }
        if let Some(file) = &self.cli.output_file {
            config.output.file = Some(file.clone());
        }
        Ok(config)
    }

    async fn query(
        &self,
        config: &ReportConfig,
        credentials: &Credentials,
        name: &str,
        nrql: &str,
        params: &StringMap,
    ) -> Result<()> {
        let client = query_client(config, credentials, None)?;
        let mut sink = build_sink(config, credentials)?;

        match client.events(nrql, &Row::new(), params).await? {
            QueryOutcome::Data(rows) => {
                let written = sink.write(name, &rows).await?;
                sink.flush().await?;
                info!("Wrote {written} rows for {name}");
                Ok(())
            }
            QueryOutcome::Unavailable {
                attempts,
                last_error,
            } => Err(Error::Other(format!(
                "query unavailable after {attempts} attempts: {last_error}"
            ))),
        }
    }

    async fn list(
        &self,
        config: &ReportConfig,
        credentials: &Credentials,
        endpoint: &str,
        entity_id: Option<&str>,
    ) -> Result<()> {
        let http = HttpClient::with_config(config.http.to_client_config())?;
        let rest_config = RestApiConfig::new(credentials.require_rest_api_key()?)
            .with_base_url(&config.endpoints.rest_url);
        let client =
            RestClient::new(http, rest_config)?.with_pagination(config.pagination.clone());

        match client.list(endpoint, entity_id).await? {
            ListOutcome::Complete { records, pages } => {
                info!("Listed {} {endpoint} records over {pages} pages", records.len());
                for record in &records {
                    println!("{}", serde_json::to_string(record)?);
                }
                Ok(())
            }
            ListOutcome::Exhausted {
                page,
                attempts,
                last_error,
            } => Err(Error::Other(format!(
                "listing {endpoint} failed on page {page} after {attempts} attempts: {last_error}"
            ))),
        }
    }
}

/// Build a query client for `account`, falling back to the shared credentials
fn query_client(
    config: &ReportConfig,
    credentials: &Credentials,
    account: Option<&Account>,
) -> Result<QueryClient> {
    let account_id = match account {
        Some(account) => account.account_id.clone(),
        None => credentials.require_account_id()?.to_string(),
    };
    let key = match account.and_then(|a| a.query_api_key.clone()) {
        Some(key) => key,
        None => credentials.require_query_api_key()?.to_string(),
    };

    let http = HttpClient::with_config(config.http.to_client_config())?;
    let api = QueryApiConfig::new(account_id, key).with_base_url(&config.endpoints.query_url);
    Ok(QueryClient::new(http, api)?.with_options(config.decode.clone()))
}

/// Create the configured sink
pub fn build_sink(config: &ReportConfig, credentials: &Credentials) -> Result<Box<dyn Sink>> {
    match config.output.sink {
        SinkKind::Csv => {
            let sink = CsvSink::new(&config.output.dir)
                .context(format!("output folder {}", config.output.dir.display()))?;
            Ok(Box::new(sink))
        }
        SinkKind::Json => match &config.output.file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file =
                    File::create(path).context(format!("output file {}", path.display()))?;
                Ok(Box::new(JsonSink::new(BufWriter::new(file)).with_tag("query")))
            }
            None => Ok(Box::new(JsonSink::stdout().with_tag("query"))),
        },
        SinkKind::Insights => {
            let http = HttpClient::with_config(config.http.to_client_config())?;
            let insights = InsightsConfig::new(
                credentials.require_account_id()?,
                credentials.require_insert_api_key()?,
            )
            .with_base_url(&config.endpoints.insights_url)
            .with_batch_size(config.output.max_events_per_batch)
            .with_timestamp(chrono::Utc::now().timestamp_millis());
            Ok(Box::new(InsightsSink::new(http, insights)?))
        }
    }
}

/// Run every query for every account and write the rows to `sink`
///
/// Each row starts with the account's metadata fields. A query that is
/// unavailable or fails to decode is logged and counted; the batch goes on.
pub async fn run_batch(
    config: &ReportConfig,
    credentials: &Credentials,
    accounts: &[Account],
    queries: &[QueryDefinition],
    sink: &mut dyn Sink,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for (index, account) in accounts.iter().enumerate() {
        info!(
            "{}/{}: {} - {}",
            index + 1,
            accounts.len(),
            account.account_id,
            account.name()
        );
        let client = query_client(config, credentials, Some(account))?;
        let include = account.metadata();

        for query in queries {
            match client.events(&query.nrql, &include, &query.params).await {
                Ok(QueryOutcome::Data(rows)) => {
                    summary.succeeded += 1;
                    summary.rows_written += sink
                        .write(&query.name, &rows)
                        .await
                        .with_context(|| format!("writing {} rows", query.name))?;
                }
                Ok(QueryOutcome::Unavailable { .. }) => {
                    summary.unavailable += 1;
                }
                Err(e) => {
                    error!(
                        "Query {} failed for account {}: {e}",
                        query.name, account.account_id
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    sink.flush().await?;
    if summary.unavailable > 0 {
        warn!("{} queries were unavailable", summary.unavailable);
    }
    Ok(summary)
}

/// Endpoint catalog as JSON
pub fn catalog_json() -> Value {
    let endpoints: Vec<Value> = list_endpoints()
        .into_iter()
        .filter_map(|name| crate::rest::get_endpoint(name).ok())
        .map(|endpoint| {
            json!({
                "name": endpoint.name,
                "path": endpoint.path,
                "result_set": endpoint.result_set,
                "requires_entity": endpoint.requires_entity(),
            })
        })
        .collect();
    json!({ "endpoints": endpoints })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_flags_override_config() {
        let cli = Cli::try_parse_from([
            "nrql-report",
            "--sink",
            "json",
            "--output-file",
            "out/rows.jsonl",
            "list",
        ])
        .unwrap();
        let config = Runner::new(cli).load_config().unwrap();

        assert_eq!(config.output.sink, SinkKind::Json);
        assert_eq!(config.output.file, Some("out/rows.jsonl".into()));
    }

    #[tokio::test]
    async fn test_json_sink_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("rows.jsonl");
        let config = ReportConfig::from_yaml(&format!(
            "output:\n  sink: json\n  file: {}\n",
            path.display()
        ))
        .unwrap();

        let mut sink = build_sink(&config, &Credentials::default()).unwrap();
        let row = json!({"count": 3}).as_object().unwrap().clone();
        assert_eq!(sink.write("throughput", &[row]).await.unwrap(), 1);
        sink.flush().await.unwrap();
        drop(sink);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\"query\":\"throughput\",\"count\":3}\n");
    }
}
