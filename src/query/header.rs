//! Header construction
//!
//! Expands the facet names and aggregate list into the ordered column list.

use super::types::{
    AggregateKind, CollisionPolicy, ContentSpec, FacetDescriptor, Header, APDEX_FIELDS,
};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Build the output header: facet columns first, then every aggregate's
/// columns in declaration order
pub fn build_header(
    contents: &[ContentSpec],
    facet: &FacetDescriptor,
    policy: CollisionPolicy,
) -> Result<Header> {
    let mut columns = facet.names();
    let fact_offset = columns.len();

    for spec in contents {
        columns.extend(column_names(spec));
    }

    let columns = disambiguate(columns, policy)?;
    Ok(Header {
        columns,
        fact_offset,
    })
}

/// Column names produced by a single aggregate
pub fn column_names(spec: &ContentSpec) -> Vec<String> {
    let name = spec.base_name();

    match &spec.kind {
        AggregateKind::Scalar => vec![name],
        AggregateKind::PercentileSet { thresholds } => thresholds
            .iter()
            .map(|threshold| format!("{name}_{threshold}"))
            .collect(),
        AggregateKind::Histogram {
            start,
            bucket_size,
            bucket_count,
        } => {
            let mut lower = *start;
            (0..*bucket_count)
                .map(|_| {
                    let upper = lower + bucket_size;
                    let column = format!("{name}_{lower:05.2}_{upper:05.2}");
                    lower = upper;
                    column
                })
                .collect()
        }
        AggregateKind::FunnelSteps { steps } => steps
            .iter()
            .map(|step| format!("{name}_{}", step.replace(' ', "_")))
            .collect(),
        AggregateKind::Apdex => APDEX_FIELDS
            .iter()
            .map(|field| format!("{name}_{field}"))
            .collect(),
        AggregateKind::Rate {
            of_function,
            of_attribute,
        } => {
            if spec.alias.is_some() {
                vec![name]
            } else {
                match of_attribute {
                    Some(attribute) => vec![format!("{name}_{of_function}_{attribute}")],
                    None => vec![format!("{name}_{of_function}")],
                }
            }
        }
    }
}

fn disambiguate(columns: Vec<String>, policy: CollisionPolicy) -> Result<Vec<String>> {
    let mut seen: HashSet<String> = HashSet::with_capacity(columns.len());
    let mut out = Vec::with_capacity(columns.len());

    for column in columns {
        if seen.insert(column.clone()) {
            out.push(column);
            continue;
        }

        match policy {
            CollisionPolicy::Reject => return Err(Error::HeaderCollision { column }),
            CollisionPolicy::Suffix => {
                let mut n = 2;
                let unique = loop {
                    let candidate = format!("{column}_{n}");
                    if !seen.contains(&candidate) {
                        break candidate;
                    }
                    n += 1;
                };
                seen.insert(unique.clone());
                out.push(unique);
            }
        }
    }

    Ok(out)
}
