//! Shape decoders
//!
//! One decoder per [`ShapeKind`]. Every decoder starts its rows from the
//! caller's include fields and flattens aggregate results through the
//! positional writer.

use super::types::{Classification, DecodeOptions, Header, ShapeKind};
use super::values::write_values;
use crate::error::{Error, Result};
use crate::types::{EventSet, Row};
use serde_json::Value;
use tracing::warn;

/// Decodes one classified response into rows
pub(crate) struct Decoder<'a> {
    classification: &'a Classification,
    header: &'a Header,
    compared: Option<Header>,
    metadata: &'a Value,
    options: &'a DecodeOptions,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(
        classification: &'a Classification,
        header: &'a Header,
        metadata: &'a Value,
        options: &'a DecodeOptions,
    ) -> Self {
        Self {
            classification,
            header,
            compared: classification
                .shape
                .is_compare()
                .then(|| header.compared()),
            metadata,
            options,
        }
    }

    /// Decode `response` into rows that all start with `include`
    pub(crate) fn decode(&self, response: &Value, include: &Row) -> Result<EventSet> {
        match self.classification.shape {
            ShapeKind::Single => self.single(response, include),
            ShapeKind::Events => self.events(response, include),
            ShapeKind::Facets => self.facets(response, include),
            ShapeKind::Timeseries => self.timeseries(response, include),
            ShapeKind::FacetsTimeseries => self.facets_timeseries(response, include),
            ShapeKind::Compare => self.compare(response, include),
            ShapeKind::CompareFacets => self.compare_facets(response, include),
            ShapeKind::CompareTimeseries => self.compare_timeseries(response, include),
        }
    }

    // ========================================================================
    // Shapes
    // ========================================================================

    fn single(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let results = list_or_empty(response, "results", "results")?;
        if results.is_empty() || self.classification.contents.is_empty() {
            return Ok(Vec::new());
        }

        let mut row = include.clone();
        self.write_window(&mut row)?;
        self.write_results(&mut row, results, self.header, "results")?;
        Ok(vec![row])
    }

    fn events(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let results = list_or_empty(response, "results", "results")?;
        let Some(first) = results.first() else {
            return Ok(Vec::new());
        };

        let events = first
            .get("events")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed("results[0].events"))?;

        events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let fields = event
                    .as_object()
                    .ok_or_else(|| Error::malformed(format!("results[0].events[{i}]")))?;

                let mut row = include.clone();
                for (key, value) in fields {
                    row.insert(key.clone(), value.clone());
                }
                if let Some(timestamp) = row.get("timestamp").and_then(Value::as_f64) {
                    row.insert(
                        "datetime".to_string(),
                        Value::from(self.options.datetime(timestamp)),
                    );
                }
                Ok(row)
            })
            .collect()
    }

    fn facets(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let groups = list_or_empty(response, "facets", "facets")?;
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let mut base = include.clone();
        self.write_window(&mut base)?;

        groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let path = format!("facets[{i}]");
                let mut row = base.clone();
                self.write_facet_group(&mut row, group, self.header, &path)?;
                Ok(row)
            })
            .collect()
    }

    fn timeseries(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let buckets = list_or_empty(response, "timeSeries", "timeSeries")?;

        buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| {
                let mut row = include.clone();
                self.write_bucket(&mut row, bucket, self.header, "", &format!("timeSeries[{i}]"))?;
                Ok(row)
            })
            .collect()
    }

    fn facets_timeseries(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let groups = list_or_empty(response, "facets", "facets")?;
        let mut rows = Vec::new();

        for (i, group) in groups.iter().enumerate() {
            let path = format!("facets[{i}]");
            let mut base = include.clone();
            self.write_facet_names(&mut base, group, &path)?;

            let buckets = group
                .get("timeSeries")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::malformed(format!("{path}.timeSeries")))?;

            for (j, bucket) in buckets.iter().enumerate() {
                let mut row = base.clone();
                self.write_bucket(
                    &mut row,
                    bucket,
                    self.header,
                    "",
                    &format!("{path}.timeSeries[{j}]"),
                )?;
                rows.push(row);
            }
        }

        Ok(rows)
    }

    fn compare(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let (current, previous) = periods(response)?;
        let current = list_or_empty(current, "results", "current.results")?;
        if current.is_empty() {
            return Ok(Vec::new());
        }
        let previous = list_or_empty(previous, "results", "previous.results")?;

        let mut row = include.clone();
        self.write_window(&mut row)?;
        self.write_compare_window(&mut row)?;
        self.write_results(&mut row, current, self.header, "current.results")?;
        self.write_results(&mut row, previous, self.previous_header(), "previous.results")?;
        Ok(vec![row])
    }

    fn compare_facets(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let (current, previous) = periods(response)?;
        let current = list_or_empty(current, "facets", "current.facets")?;
        if current.is_empty() {
            return Ok(Vec::new());
        }
        let previous = list_or_empty(previous, "facets", "previous.facets")?;
        if current.len() != previous.len() {
            warn!(
                "Compared facet groups differ in length ({} current, {} previous)",
                current.len(),
                previous.len()
            );
        }

        let mut base = include.clone();
        self.write_window(&mut base)?;
        self.write_compare_window(&mut base)?;

        current
            .iter()
            .zip(previous)
            .enumerate()
            .map(|(i, (now, before))| {
                let mut row = base.clone();
                self.write_facet_group(&mut row, now, self.header, &format!("current.facets[{i}]"))?;
                self.write_facet_group(
                    &mut row,
                    before,
                    self.previous_header(),
                    &format!("previous.facets[{i}]"),
                )?;
                Ok(row)
            })
            .collect()
    }

    fn compare_timeseries(&self, response: &Value, include: &Row) -> Result<EventSet> {
        let (current, previous) = periods(response)?;
        let current = list_or_empty(current, "timeSeries", "current.timeSeries")?;
        if current.is_empty() {
            return Ok(Vec::new());
        }
        let previous = list_or_empty(previous, "timeSeries", "previous.timeSeries")?;
        if current.len() != previous.len() {
            warn!(
                "Compared time series differ in length ({} current, {} previous)",
                current.len(),
                previous.len()
            );
        }

        current
            .iter()
            .zip(previous)
            .enumerate()
            .map(|(i, (now, before))| {
                let mut row = include.clone();
                self.write_bucket(
                    &mut row,
                    now,
                    self.header,
                    "",
                    &format!("current.timeSeries[{i}]"),
                )?;
                self.write_bucket(
                    &mut row,
                    before,
                    self.previous_header(),
                    "_compare",
                    &format!("previous.timeSeries[{i}]"),
                )?;
                Ok(row)
            })
            .collect()
    }

    // ========================================================================
    // Row building blocks
    // ========================================================================

    /// Columns for previous-period values
    fn previous_header(&self) -> &Header {
        self.compared.as_ref().unwrap_or(self.header)
    }

    fn write_results(&self, row: &mut Row, results: &[Value], header: &Header, path: &str) -> Result<()> {
        write_values(
            row,
            results,
            &self.classification.contents,
            header.value_columns(),
            path,
        )
    }

    /// `timewindow`, `timestamp` and `datetime` of the queried period
    fn write_window(&self, row: &mut Row) -> Result<()> {
        let begin = integer(self.metadata, "beginTimeMillis", "metadata")?;
        let end = integer(self.metadata, "endTimeMillis", "metadata")?;

        let window = end
            .checked_sub(begin)
            .ok_or_else(|| Error::malformed("metadata.endTimeMillis"))?;

        row.insert("timewindow".to_string(), Value::from(window));
        row.insert("timestamp".to_string(), Value::from(end));
        row.insert(
            "datetime".to_string(),
            Value::from(self.options.datetime(end as f64)),
        );
        Ok(())
    }

    /// `timestamp_compare` and `datetime_compare` of the previous period
    fn write_compare_window(&self, row: &mut Row) -> Result<()> {
        let begin = integer(self.metadata, "beginTimeMillis", "metadata")?;
        let offset = integer(self.metadata, "compareWith", "metadata")?;
        let previous = begin
            .checked_sub(offset)
            .ok_or_else(|| Error::malformed("metadata.compareWith"))?;

        row.insert("timestamp_compare".to_string(), Value::from(previous));
        row.insert(
            "datetime_compare".to_string(),
            Value::from(self.options.datetime(previous as f64)),
        );
        Ok(())
    }

    fn write_facet_group(&self, row: &mut Row, group: &Value, header: &Header, path: &str) -> Result<()> {
        self.write_facet_names(row, group, path)?;
        let results = group
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed(format!("{path}.results")))?;
        self.write_results(row, results, header, &format!("{path}.results"))
    }

    /// Spread a group's facet value over the facet columns
    fn write_facet_names(&self, row: &mut Row, group: &Value, path: &str) -> Result<()> {
        let name = group
            .get("name")
            .ok_or_else(|| Error::malformed(format!("{path}.name")))?;
        let columns = self.header.facet_columns();

        match name {
            Value::Array(values) => {
                for (column, value) in columns.iter().zip(values) {
                    row.insert(column.clone(), value.clone());
                }
            }
            scalar => {
                if let Some(column) = columns.first() {
                    row.insert(column.clone(), scalar.clone());
                }
            }
        }
        Ok(())
    }

    /// Values of one time bucket followed by its time fields
    fn write_bucket(
        &self,
        row: &mut Row,
        bucket: &Value,
        header: &Header,
        suffix: &str,
        path: &str,
    ) -> Result<()> {
        let results = bucket
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed(format!("{path}.results")))?;
        self.write_results(row, results, header, &format!("{path}.results"))?;

        let inspected = bucket
            .get("inspectedCount")
            .ok_or_else(|| Error::malformed(format!("{path}.inspectedCount")))?;
        let begin = integer(bucket, "beginTimeSeconds", path)?;
        let end = integer(bucket, "endTimeSeconds", path)?;

        let window = end
            .checked_sub(begin)
            .ok_or_else(|| Error::malformed(format!("{path}.endTimeSeconds")))?;

        row.insert(format!("inspectedCount{suffix}"), inspected.clone());
        row.insert(format!("timewindow{suffix}"), Value::from(window));
        row.insert(format!("timestamp{suffix}"), Value::from(end));
        row.insert(
            format!("datetime{suffix}"),
            Value::from(self.options.datetime(end as f64 * 1000.0)),
        );
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// A list under `key`, where an absent or null value means no data
fn list_or_empty<'v>(parent: &'v Value, key: &str, path: &str) -> Result<&'v [Value]> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::malformed(path)),
    }
}

fn periods(response: &Value) -> Result<(&Value, &Value)> {
    let current = response
        .get("current")
        .ok_or_else(|| Error::malformed("current"))?;
    let previous = response
        .get("previous")
        .ok_or_else(|| Error::malformed("previous"))?;
    Ok((current, previous))
}

/// Integer field, truncating fractional values
fn integer(parent: &Value, key: &str, path: &str) -> Result<i64> {
    let value = parent
        .get(key)
        .ok_or_else(|| Error::malformed(format!("{path}.{key}")))?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v as i64))
        .ok_or_else(|| Error::malformed(format!("{path}.{key}")))
}
