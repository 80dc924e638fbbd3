// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # nrql-report
//!
//! Runs NRQL queries against the query API and flattens whatever shape comes
//! back (single, facets, timeseries, compare-with and their combinations)
//! into ordered rows.
//!
//! ## Features
//!
//! - **Shape-aware decoding**: eight result shapes, one row layout each
//! - **Typed aggregates**: percentiles, histograms, funnels, apdex and rates
//!   expand to one column per value
//! - **Bounded retries**: an exhausted request is an explicit outcome, never
//!   an empty result
//! - **REST listings**: a catalog of list endpoints with link-header paging
//! - **Sinks**: CSV folders, JSON lines and custom event ingestion
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nrql_report::http::HttpClient;
//! use nrql_report::query::{QueryApiConfig, QueryClient, QueryOutcome};
//!
//! #[tokio::main]
//! async fn main() -> nrql_report::Result<()> {
//!     let client = QueryClient::new(HttpClient::new()?, QueryApiConfig::new("123", "NRIQ-..."))?;
//!     let include = nrql_report::Row::new();
//!
//!     let nrql = "SELECT count(*) FROM Transaction FACET appName TIMESERIES";
//!     if let QueryOutcome::Data(rows) = client.events(nrql, &include, &Default::default()).await? {
//!         for row in rows {
//!             println!("{}", serde_json::to_string(&row)?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │        QueryClient.events(nrql, include) → Vec<Row>          │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────┬─────────────┬───┴─────────┬────────────┬─────────┐
//! │   HTTP     │  Classify   │   Header    │  Decoders  │ Output  │
//! ├────────────┼─────────────┼─────────────┼────────────┼─────────┤
//! │ Retry      │ 8 shapes    │ Aggregates  │ Single     │ CSV     │
//! │ Rate Limit │ Facets      │ Collisions  │ Facets     │ JSON    │
//! │ Backoff    │ Contents    │ _compare    │ Timeseries │ Events  │
//! │ Link pages │             │             │ Compare    │         │
//! └────────────┴─────────────┴─────────────┴────────────┴─────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with retry and rate limiting
pub mod http;

/// Link-following pagination for list endpoints
pub mod pagination;

/// Query result classification and row decoding
pub mod query;

/// REST list endpoint catalog and client
pub mod rest;

/// Row sinks
pub mod output;

/// Run configuration, query files and accounts
pub mod config;

/// Command-line interface
pub mod cli;

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::{Account, Credentials, QueryDefinition, ReportConfig};
pub use query::{decode_response, QueryClient, QueryOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
