//! Query result types
//!
//! The closed vocabularies the normalizer works with: response shapes,
//! facet descriptors, aggregate kinds and the resolved header.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Days between 1899-12-30 and 1970-01-01, the serial date of the Unix
/// epoch in spreadsheet date systems
pub const SPREADSHEET_EPOCH_DAYS: f64 = 25569.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Convert an epoch-millisecond timestamp to a spreadsheet serial date
pub fn to_spreadsheet_datetime(timestamp_ms: f64, epoch_offset_days: f64) -> f64 {
    timestamp_ms / MILLIS_PER_DAY + epoch_offset_days
}

// ============================================================================
// Shape
// ============================================================================

/// Structural shape of a query response, derived from its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Aggregates without modifiers: one row
    Single,
    /// Raw event list
    Events,
    /// `FACET`
    Facets,
    /// `TIMESERIES`
    Timeseries,
    /// `FACET ... TIMESERIES`
    FacetsTimeseries,
    /// `COMPARE WITH`
    Compare,
    /// `COMPARE WITH ... FACET`
    CompareFacets,
    /// `COMPARE WITH ... TIMESERIES`
    CompareTimeseries,
}

impl ShapeKind {
    /// Resolve the shape from the three modifier flags
    ///
    /// `is_event_list` only matters when no modifier is present.
    pub fn from_modifiers(
        has_compare: bool,
        has_facet: bool,
        has_timeseries: bool,
        is_event_list: bool,
    ) -> Self {
        match (has_compare, has_facet, has_timeseries) {
            (true, true, _) => Self::CompareFacets,
            (true, false, true) => Self::CompareTimeseries,
            (true, false, false) => Self::Compare,
            (false, true, true) => Self::FacetsTimeseries,
            (false, true, false) => Self::Facets,
            (false, false, true) => Self::Timeseries,
            (false, false, false) if is_event_list => Self::Events,
            (false, false, false) => Self::Single,
        }
    }

    /// Whether previous-period values are present
    pub fn is_compare(self) -> bool {
        matches!(
            self,
            Self::Compare | Self::CompareFacets | Self::CompareTimeseries
        )
    }
}

// ============================================================================
// Facets
// ============================================================================

/// Facet attribute name(s) of a response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FacetDescriptor {
    #[default]
    None,
    Single(String),
    Multi(Vec<String>),
}

impl FacetDescriptor {
    /// Parse a `facet` metadata value (a name or a list of names)
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::Single(name.clone())),
            Value::Array(names) => names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    name.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| Error::malformed(format!("{path}[{i}]")))
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Multi),
            _ => Err(Error::malformed(path)),
        }
    }

    /// Facet column names, in order
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Single(name) => vec![name.clone()],
            Self::Multi(names) => names.clone(),
        }
    }

    /// Number of leading facet columns
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Single(_) => 1,
            Self::Multi(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// How one aggregate serializes its values, fixed at classification time
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateKind {
    /// One value, the first field of the result entry
    Scalar,
    /// `percentile(attr, ...)`: one value per threshold
    PercentileSet { thresholds: Vec<String> },
    /// `histogram(attr, ...)`: one value per bucket
    Histogram {
        start: f64,
        bucket_size: f64,
        bucket_count: usize,
    },
    /// `funnel(attr, ...)`: one count per step
    FunnelSteps { steps: Vec<String> },
    /// `apdex(attr, t)`: count, s, t, f, score
    Apdex,
    /// `rate(aggregate, period)`: one value, named after the wrapped aggregate
    Rate {
        of_function: String,
        of_attribute: Option<String>,
    },
}

/// Apdex fields in column order
pub const APDEX_FIELDS: [&str; 5] = ["count", "s", "t", "f", "score"];

/// One requested aggregate expression
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSpec {
    pub function: String,
    pub attribute: Option<String>,
    pub alias: Option<String>,
    pub kind: AggregateKind,
}

impl ContentSpec {
    /// Build a spec from one `contents` entry
    ///
    /// Aliased aggregates arrive wrapped as `{"alias": .., "contents": {..}}`;
    /// the aggregate itself is read from the inner object.
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        let alias = value
            .get("alias")
            .and_then(Value::as_str)
            .filter(|alias| !alias.is_empty())
            .map(str::to_string);

        let (inner, inner_path) = match (&alias, value.get("contents")) {
            (Some(_), Some(nested)) if nested.is_object() => (nested, format!("{path}.contents")),
            _ => (value, path.to_string()),
        };

        let function = inner
            .get("function")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(format!("{inner_path}.function")))?
            .to_string();

        let attribute = inner
            .get("attribute")
            .and_then(Value::as_str)
            .filter(|attribute| !attribute.is_empty())
            .map(str::to_string);

        let field = |name: &str| {
            inner
                .get(name)
                .ok_or_else(|| Error::malformed(format!("{inner_path}.{name}")))
        };

        let kind = match function.as_str() {
            "percentile" => AggregateKind::PercentileSet {
                thresholds: list_of(field("thresholds")?, &format!("{inner_path}.thresholds"))?
                    .iter()
                    .map(label)
                    .collect(),
            },
            "histogram" => AggregateKind::Histogram {
                start: number(field("start")?, &format!("{inner_path}.start"))?,
                bucket_size: number(field("bucketSize")?, &format!("{inner_path}.bucketSize"))?,
                bucket_count: field("bucketCount")?
                    .as_u64()
                    .ok_or_else(|| Error::malformed(format!("{inner_path}.bucketCount")))?
                    as usize,
            },
            "funnel" => AggregateKind::FunnelSteps {
                steps: list_of(field("steps")?, &format!("{inner_path}.steps"))?
                    .iter()
                    .map(label)
                    .collect(),
            },
            "apdex" => AggregateKind::Apdex,
            "rate" => {
                let of = field("of")?;
                AggregateKind::Rate {
                    of_function: of
                        .get("function")
                        .and_then(Value::as_str)
                        .ok_or_else(|| Error::malformed(format!("{inner_path}.of.function")))?
                        .to_string(),
                    of_attribute: of
                        .get("attribute")
                        .and_then(Value::as_str)
                        .filter(|attribute| !attribute.is_empty())
                        .map(str::to_string),
                }
            }
            _ => AggregateKind::Scalar,
        };

        Ok(Self {
            function,
            attribute,
            alias,
            kind,
        })
    }

    /// Create a plain scalar aggregate
    pub fn scalar(function: impl Into<String>, attribute: Option<&str>) -> Self {
        Self {
            function: function.into(),
            attribute: attribute.map(str::to_string),
            alias: None,
            kind: AggregateKind::Scalar,
        }
    }

    /// Column stem: alias, else `function_attribute`, else `function`
    pub fn base_name(&self) -> String {
        match (&self.alias, &self.attribute) {
            (Some(alias), _) => alias.clone(),
            (None, Some(attribute)) => format!("{}_{attribute}", self.function),
            (None, None) => self.function.clone(),
        }
    }

    /// Number of columns this aggregate expands to
    pub fn width(&self) -> usize {
        match &self.kind {
            AggregateKind::Scalar | AggregateKind::Rate { .. } => 1,
            AggregateKind::PercentileSet { thresholds } => thresholds.len(),
            AggregateKind::Histogram { bucket_count, .. } => *bucket_count,
            AggregateKind::FunnelSteps { steps } => steps.len(),
            AggregateKind::Apdex => APDEX_FIELDS.len(),
        }
    }
}

fn list_of<'v>(value: &'v Value, path: &str) -> Result<&'v Vec<Value>> {
    value.as_array().ok_or_else(|| Error::malformed(path))
}

fn number(value: &Value, path: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| Error::malformed(path))
}

/// Render a threshold or step for use in a column name
fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Header
// ============================================================================

/// What to do when two aggregates produce the same column name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Append `_2`, `_3`, ... to later duplicates
    #[default]
    Suffix,
    /// Fail the decode
    Reject,
}

/// Ordered output columns of one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Facet columns followed by aggregate columns
    pub columns: Vec<String>,
    /// Number of leading facet columns
    pub fact_offset: usize,
}

impl Header {
    /// Facet columns
    pub fn facet_columns(&self) -> &[String] {
        &self.columns[..self.fact_offset]
    }

    /// Aggregate columns
    pub fn value_columns(&self) -> &[String] {
        &self.columns[self.fact_offset..]
    }

    /// Header for previous-period values: aggregate columns get `_compare`,
    /// facet columns are left alone
    #[must_use]
    pub fn compared(&self) -> Header {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if i < self.fact_offset {
                    column.clone()
                } else {
                    format!("{column}_compare")
                }
            })
            .collect();

        Header {
            columns,
            fact_offset: self.fact_offset,
        }
    }
}

/// Everything the classifier learns from a response's metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub shape: ShapeKind,
    pub contents: Vec<ContentSpec>,
    pub facet: FacetDescriptor,
}

/// Options that shape how rows are produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Serial day of the Unix epoch used for derived `datetime` fields
    #[serde(default = "default_epoch")]
    pub epoch_offset_days: f64,
    /// Handling of duplicate column names
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

fn default_epoch() -> f64 {
    SPREADSHEET_EPOCH_DAYS
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            epoch_offset_days: SPREADSHEET_EPOCH_DAYS,
            collision_policy: CollisionPolicy::default(),
        }
    }
}

impl DecodeOptions {
    /// Convert an epoch-millisecond timestamp with these options
    pub fn datetime(&self, timestamp_ms: f64) -> f64 {
        to_spreadsheet_datetime(timestamp_ms, self.epoch_offset_days)
    }
}
