//! Shape classification
//!
//! Reads a response's `metadata` once and resolves its shape, the aggregate
//! list and the facet names.

use super::types::{Classification, ContentSpec, FacetDescriptor, ShapeKind};
use crate::error::{Error, Result};
use serde_json::Value;

/// Classify a query response from its `metadata` object
///
/// A modifier flag whose nested `contents` path is missing fails the whole
/// classification.
pub fn classify(metadata: &Value) -> Result<Classification> {
    let contents = metadata.get("contents");
    let nested_has = |key: &str| {
        contents
            .and_then(Value::as_object)
            .is_some_and(|object| object.contains_key(key))
    };

    let has_compare = metadata.get("compareWith").is_some();
    let has_facet = metadata.get("facet").is_some() || nested_has("facet");
    let has_timeseries = metadata.get("timeSeries").is_some() || nested_has("timeSeries");
    let is_simple = !has_compare && !has_facet && !has_timeseries;

    let path: &[&str] = match (has_compare, has_facet, has_timeseries) {
        (true, _, true) | (_, true, true) => &["contents", "timeSeries", "contents"],
        (false, false, true) => &["timeSeries", "contents"],
        (true, true, false) => &["contents", "contents", "contents"],
        (true, false, false) | (false, true, false) => &["contents", "contents"],
        (false, false, false) => &["contents"],
    };
    let list = resolve(metadata, path)?;

    let is_event_list = is_simple
        && list
            .first()
            .and_then(Value::as_object)
            .is_some_and(|first| first.contains_key("order"));
    let shape = ShapeKind::from_modifiers(has_compare, has_facet, has_timeseries, is_event_list);

    // Event lists carry their own columns
    let contents = if shape == ShapeKind::Events {
        Vec::new()
    } else {
        let base = format!("metadata.{}", path.join("."));
        list.iter()
            .enumerate()
            .map(|(i, content)| ContentSpec::from_value(content, &format!("{base}[{i}]")))
            .collect::<Result<Vec<_>>>()?
    };

    let facet = if !has_facet {
        FacetDescriptor::None
    } else if has_compare {
        let value = resolve_value(metadata, &["contents", "facet"])?;
        FacetDescriptor::from_value(value, "metadata.contents.facet")?
    } else {
        let value = resolve_value(metadata, &["facet"])?;
        FacetDescriptor::from_value(value, "metadata.facet")?
    };

    Ok(Classification {
        shape,
        contents,
        facet,
    })
}

fn resolve_value<'v>(metadata: &'v Value, path: &[&str]) -> Result<&'v Value> {
    let mut current = metadata;
    for (depth, key) in path.iter().enumerate() {
        current = current
            .get(key)
            .ok_or_else(|| Error::malformed(format!("metadata.{}", path[..=depth].join("."))))?;
    }
    Ok(current)
}

fn resolve<'v>(metadata: &'v Value, path: &[&str]) -> Result<&'v Vec<Value>> {
    resolve_value(metadata, path)?
        .as_array()
        .ok_or_else(|| Error::malformed(format!("metadata.{}", path.join("."))))
}
