//! Positional value writer
//!
//! Every decoder that flattens a `results` list goes through
//! [`write_values`]. Each aggregate consumes the result entry at its own
//! position and fills exactly as many columns as its header expansion.

use super::types::{AggregateKind, ContentSpec, APDEX_FIELDS};
use crate::error::{Error, Result};
use crate::types::Row;
use serde_json::Value;

/// Write one `results` list into `row` against the aggregate columns
///
/// `columns` is the post-offset slice of a header built from `specs`.
/// `path` names the results list in error messages.
pub(crate) fn write_values(
    row: &mut Row,
    results: &[Value],
    specs: &[ContentSpec],
    columns: &[String],
    path: &str,
) -> Result<()> {
    if results.len() > specs.len() {
        return Err(Error::malformed(format!(
            "metadata contents for {path}[{}]",
            specs.len()
        )));
    }

    let mut index = 0;
    for (position, spec) in specs.iter().enumerate() {
        let entry_path = format!("{path}[{position}]");
        let entry = results
            .get(position)
            .ok_or_else(|| Error::malformed(&entry_path))?;

        let width = spec.width();
        let targets = columns
            .get(index..index + width)
            .ok_or_else(|| Error::Other(format!("header too short for {entry_path}")))?;

        for (column, value) in targets.iter().zip(entry_values(entry, spec, width, &entry_path)?) {
            row.insert(column.clone(), value);
        }
        index += width;
    }

    Ok(())
}

/// Extract exactly `width` values for one aggregate
fn entry_values(entry: &Value, spec: &ContentSpec, width: usize, path: &str) -> Result<Vec<Value>> {
    let values: Vec<Value> = match &spec.kind {
        AggregateKind::PercentileSet { .. } => entry
            .get("percentiles")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::malformed(format!("{path}.percentiles")))?
            .values()
            .cloned()
            .collect(),
        AggregateKind::Histogram { .. } => array_field(entry, "histogram", path)?,
        AggregateKind::FunnelSteps { .. } => array_field(entry, "steps", path)?,
        AggregateKind::Apdex => APDEX_FIELDS
            .iter()
            .map(|field| {
                entry
                    .get(*field)
                    .cloned()
                    .ok_or_else(|| Error::malformed(format!("{path}.{field}")))
            })
            .collect::<Result<_>>()?,
        AggregateKind::Scalar | AggregateKind::Rate { .. } => {
            let first = entry
                .as_object()
                .and_then(|object| object.values().next())
                .ok_or_else(|| Error::malformed(path))?;
            vec![first.clone()]
        }
    };

    if values.len() != width {
        return Err(Error::malformed(format!(
            "{path} ({width} values expected, got {})",
            values.len()
        )));
    }

    Ok(values)
}

fn array_field(entry: &Value, key: &str, path: &str) -> Result<Vec<Value>> {
    entry
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| Error::malformed(format!("{path}.{key}")))
}
