//! JSON lines sink

use super::sink::Sink;
use crate::error::Result;
use crate::types::Row;
use async_trait::async_trait;
use std::io::Write;

/// Writes one JSON object per line, tagging each with its stream name
/// under `tag_field` when set
pub struct JsonSink<W: Write + Send> {
    writer: W,
    tag_field: Option<String>,
}

impl JsonSink<std::io::Stdout> {
    /// Sink printing to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            tag_field: None,
        }
    }

    /// Prefix every row with its stream name under `field`
    #[must_use]
    pub fn with_tag(mut self, field: impl Into<String>) -> Self {
        self.tag_field = Some(field.into());
        self
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> Sink for JsonSink<W> {
    async fn write(&mut self, name: &str, rows: &[Row]) -> Result<usize> {
        for row in rows {
            match &self.tag_field {
                Some(field) => {
                    let mut tagged = Row::new();
                    tagged.insert(field.clone(), name.into());
                    tagged.extend(row.clone());
                    serde_json::to_writer(&mut self.writer, &tagged)?;
                }
                None => serde_json::to_writer(&mut self.writer, row)?,
            }
            self.writer.write_all(b"\n")?;
        }
        Ok(rows.len())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
