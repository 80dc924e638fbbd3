//! Local CSV folder sink
//!
//! One `<name>.csv` file per row stream. The first batch fixes the columns
//! and writes the header; later batches append under the same columns.

use super::sink::{cell, Sink};
use crate::error::{Error, Result};
use crate::types::Row;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

struct CsvFile {
    writer: csv::Writer<File>,
    columns: Vec<String>,
}

/// Writes each row stream to its own CSV file in a directory
pub struct CsvSink {
    dir: PathBuf,
    files: HashMap<String, CsvFile>,
}

impl CsvSink {
    /// Create a sink writing into `dir`, creating it if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            files: HashMap::new(),
        })
    }

    /// Path of the file for a row stream
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    fn open(&self, name: &str, first: &Row) -> Result<CsvFile> {
        let path = self.path_for(name);
        let file = File::create(&path)
            .map_err(|e| Error::output(format!("cannot create {}: {e}", path.display())))?;
        let mut writer = csv::Writer::from_writer(file);

        let columns: Vec<String> = first.keys().cloned().collect();
        writer.write_record(&columns)?;
        debug!("Created {} with {} columns", path.display(), columns.len());

        Ok(CsvFile { writer, columns })
    }
}

#[async_trait]
impl Sink for CsvSink {
    async fn write(&mut self, name: &str, rows: &[Row]) -> Result<usize> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };

        if !self.files.contains_key(name) {
            let file = self.open(name, first)?;
            self.files.insert(name.to_string(), file);
        }
        let Some(target) = self.files.get_mut(name) else {
            return Ok(0);
        };

        for row in rows {
            let extra = row
                .keys()
                .filter(|key| !target.columns.contains(key))
                .count();
            if extra > 0 {
                warn!("Dropping {extra} field(s) not in the {name}.csv header");
            }

            let record: Vec<String> = target
                .columns
                .iter()
                .map(|column| row.get(column).map(cell).unwrap_or_default())
                .collect();
            target.writer.write_record(&record)?;
        }
        target.writer.flush()?;

        Ok(rows.len())
    }

    async fn flush(&mut self) -> Result<()> {
        for file in self.files.values_mut() {
            file.writer.flush()?;
        }
        Ok(())
    }
}
