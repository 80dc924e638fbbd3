//! CLI module
//!
//! Command-line interface for running reports.
//!
//! # Commands
//!
//! - `query` - Run one query and write its rows
//! - `batch` - Run a query file across an accounts file
//! - `list` - List REST endpoint records, or the endpoint catalog

mod commands;
mod runner;

pub use commands::{Cli, Commands, CredentialArgs, SinkOption};
pub use runner::{build_sink, catalog_json, run_batch, BatchSummary, Runner};
