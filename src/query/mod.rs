//! Query module
//!
//! Normalizes NRQL query responses into flat rows.
//!
//! # Overview
//!
//! A response describes itself through its `metadata`. The classifier reads
//! it once and resolves one of eight [`ShapeKind`]s together with the
//! aggregate list and facet names. The header builder expands those into
//! ordered columns, and the matching shape decoder flattens the payload
//! into rows positionally aligned with that header.
//!
//! ```text
//! metadata ─► classify ─► build_header ─► Decoder(shape) ─► EventSet
//! ```

mod classify;
mod decoders;
mod header;
mod normalizer;
mod params;
mod types;
mod values;

pub use classify::classify;
pub use header::{build_header, column_names};
pub use normalizer::{
    decode, decode_response, Decoded, QueryApiConfig, QueryClient, QueryOutcome, DEFAULT_QUERY_URL,
};
pub use params::{extract_params, render_nrql};
pub use types::{
    to_spreadsheet_datetime, AggregateKind, Classification, CollisionPolicy, ContentSpec,
    DecodeOptions, FacetDescriptor, Header, ShapeKind, APDEX_FIELDS, SPREADSHEET_EPOCH_DAYS,
};

#[cfg(test)]
mod tests;
