//! Sink trait

use crate::error::Result;
use crate::types::Row;
use async_trait::async_trait;
use serde_json::Value;

/// Destination for normalized rows
///
/// `name` identifies the row stream (query name or event type). Sinks own
/// header persistence and append semantics.
#[async_trait]
pub trait Sink: Send {
    /// Write a batch of rows, returning how many were accepted
    async fn write(&mut self, name: &str, rows: &[Row]) -> Result<usize>;

    /// Flush buffered output
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Render a JSON value as a flat text cell
pub(crate) fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
