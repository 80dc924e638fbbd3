//! Output module
//!
//! Sinks that persist normalized rows.
//!
//! # Overview
//!
//! This module provides:
//! - The [`Sink`] trait
//! - A local CSV folder sink, one file per row stream
//! - A JSON lines sink for stdout or files
//! - An event ingestion sink posting rows as custom events

mod insights;
mod json;
mod local;
mod sink;

pub use insights::{InsightsConfig, InsightsSink, DEFAULT_INSIGHTS_URL, DEFAULT_MAX_EVENTS_PER_BATCH};
pub use json::JsonSink;
pub use local::CsvSink;
pub use sink::Sink;
