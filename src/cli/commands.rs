//! CLI commands and argument parsing

use crate::config::{
    Credentials, ACCOUNT_ID_ENV, INSERT_API_KEY_ENV, QUERY_API_KEY_ENV, REST_API_KEY_ENV,
};
use crate::types::SinkKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run NRQL queries and ship flattened rows to CSV, JSON or event ingestion
#[derive(Parser, Debug)]
#[command(name = "nrql-report")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Sink override
    #[arg(short, long, global = true)]
    pub sink: Option<SinkOption>,

    /// Folder for CSV output
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// File for JSON output instead of stdout
    #[arg(long, global = true)]
    pub output_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Account id and API keys; flags win over the environment
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Account to query
    #[arg(short, long, global = true, env = ACCOUNT_ID_ENV)]
    pub account_id: Option<String>,

    #[arg(long, global = true, env = QUERY_API_KEY_ENV, hide_env_values = true)]
    pub query_api_key: Option<String>,

    #[arg(long, global = true, env = REST_API_KEY_ENV, hide_env_values = true)]
    pub rest_api_key: Option<String>,

    #[arg(long, global = true, env = INSERT_API_KEY_ENV, hide_env_values = true)]
    pub insert_api_key: Option<String>,
}

impl From<CredentialArgs> for Credentials {
    fn from(args: CredentialArgs) -> Self {
        Self {
            account_id: args.account_id,
            query_api_key: args.query_api_key,
            rest_api_key: args.rest_api_key,
            insert_api_key: args.insert_api_key,
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one query against one account
    Query {
        /// Query text, may contain `{name}` placeholders
        #[arg(short, long)]
        nrql: String,

        /// Placeholder value as `name=value` (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Stream name used for the output file or event type
        #[arg(long, default_value = "query")]
        name: String,
    },

    /// Run every query in a query file for every account
    Batch {
        /// Query file (YAML list of name/nrql/params)
        #[arg(short, long)]
        queries: PathBuf,

        /// Accounts file (CSV); defaults to the single configured account
        #[arg(long)]
        accounts: Option<PathBuf>,
    },

    /// List records from a REST endpoint, or the endpoint names
    List {
        /// Endpoint name; omit to print the catalog
        endpoint: Option<String>,

        /// Entity id for entity-scoped endpoints
        #[arg(short, long)]
        entity_id: Option<String>,
    },
}

impl Commands {
    /// Subcommand name, for error context
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Query { .. } => "query",
            Commands::Batch { .. } => "batch",
            Commands::List { .. } => "list",
        }
    }
}

/// Sink selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SinkOption {
    /// One CSV file per query
    Csv,
    /// JSON lines on stdout or to `--output-file`
    Json,
    /// Custom events
    Insights,
}

impl From<SinkOption> for SinkKind {
    fn from(option: SinkOption) -> Self {
        match option {
            SinkOption::Csv => SinkKind::Csv,
            SinkOption::Json => SinkKind::Json,
            SinkOption::Insights => SinkKind::Insights,
        }
    }
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}
