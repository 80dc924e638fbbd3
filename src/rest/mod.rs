//! REST module
//!
//! Catalog of REST list endpoints and a client that walks them with the
//! paginated fetcher.

mod catalog;
mod client;

pub use catalog::{
    get_endpoint, is_endpoint, list_endpoints, Endpoint, EndpointPaging, DEFAULT_REST_URL,
    ENDPOINTS,
};
pub use client::{RestApiConfig, RestClient, DEPLOYMENT_WINDOW_DAYS};
