//! REST list client

use super::catalog::{get_endpoint, EndpointPaging, DEFAULT_REST_URL};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{
    LinkHeaderPaginator, ListOutcome, NoPaginator, PaginatedFetcher, PaginationConfig, Paginator,
    StopCondition,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Deployments older than this end a deployment listing
pub const DEPLOYMENT_WINDOW_DAYS: i64 = 30;

/// Connection settings for the REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestApiConfig {
    #[serde(default = "default_rest_url")]
    pub base_url: String,
    /// Key sent as `X-Api-Key`
    pub rest_api_key: String,
}

fn default_rest_url() -> String {
    DEFAULT_REST_URL.to_string()
}

impl RestApiConfig {
    pub fn new(rest_api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_REST_URL.to_string(),
            rest_api_key: rest_api_key.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Lists entities from the built-in REST endpoints
pub struct RestClient {
    client: HttpClient,
    config: RestApiConfig,
    pagination: PaginationConfig,
}

impl RestClient {
    pub fn new(client: HttpClient, config: RestApiConfig) -> Result<Self> {
        if config.rest_api_key.is_empty() {
            return Err(Error::missing_field("rest_api_key"));
        }
        Ok(Self {
            client,
            config,
            pagination: PaginationConfig::default(),
        })
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Fetch every record of a named endpoint
    ///
    /// Entity-scoped endpoints need `entity_id`.
    pub async fn list(&self, endpoint: &str, entity_id: Option<&str>) -> Result<ListOutcome> {
        let endpoint = get_endpoint(endpoint)?;
        let url = endpoint.url(&self.config.base_url, entity_id)?;
        let request = RequestConfig::new().header("X-Api-Key", &self.config.rest_api_key);

        let link_header =
            LinkHeaderPaginator::default().with_page_limit("page", self.pagination.max_pages);
        let (paginator, stop): (&dyn Paginator, StopCondition) = match endpoint.paging {
            EndpointPaging::Single => (&NoPaginator, StopCondition::Never),
            EndpointPaging::LinkHeader => (&link_header, StopCondition::Never),
            EndpointPaging::RecentDeployments => (
                &link_header,
                StopCondition::older_than("timestamp", Duration::days(DEPLOYMENT_WINDOW_DAYS)),
            ),
        };

        let outcome = PaginatedFetcher::new(&self.client, self.pagination.clone())
            .fetch_all(&url, request, endpoint.result_set, paginator, &stop)
            .await?;

        if let ListOutcome::Complete { records, pages } = &outcome {
            info!(
                "Listed {} {} across {pages} page(s)",
                records.len(),
                endpoint.name
            );
        }
        Ok(outcome)
    }
}
