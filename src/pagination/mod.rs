//! Pagination module
//!
//! Supports: Link Header, Next URL in body, no pagination
//!
//! # Overview
//!
//! The pagination module walks REST list endpoints. A [`Paginator`] finds
//! each page's continuation, a [`StopCondition`] can end the walk early, and
//! [`PaginatedFetcher`] drives the loop on top of the retrying HTTP client
//! with a hard page cap.

mod fetcher;
mod strategies;
mod types;

pub use fetcher::{ListOutcome, PaginatedFetcher};
pub use strategies::{LinkHeaderPaginator, NextUrlPaginator, NoPaginator};
pub use types::{
    NextPage, PaginationConfig, PaginationState, Paginator, StopCondition, StopResult,
    DEFAULT_MAX_PAGES,
};
