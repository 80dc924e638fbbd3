//! Built-in REST list endpoints
//!
//! Every entry names a list endpoint of the REST API, the field holding its
//! records and how it paginates.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Default host of the REST API
pub const DEFAULT_REST_URL: &str = "https://api.newrelic.com";

/// Placeholder for the entity id in endpoint paths
const ENTITY_PLACEHOLDER: &str = "{}";

/// How an endpoint is paged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointPaging {
    /// Single request
    Single,
    /// `Link: <...>; rel="next"`, page number bounded by the page cap
    LinkHeader,
    /// Link header, stopping once deployments are older than 30 days
    RecentDeployments,
}

/// A named list endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: &'static str,
    /// Path below the API host; `{}` marks the entity id
    pub path: &'static str,
    /// Top-level field holding the records
    pub result_set: &'static str,
    pub paging: EndpointPaging,
}

impl Endpoint {
    const fn new(
        name: &'static str,
        path: &'static str,
        result_set: &'static str,
        paging: EndpointPaging,
    ) -> Self {
        Self {
            name,
            path,
            result_set,
            paging,
        }
    }

    /// Whether the path needs an entity id
    pub fn requires_entity(&self) -> bool {
        self.path.contains(ENTITY_PLACEHOLDER)
    }

    /// Resolve the full URL against `base_url`
    pub fn url(&self, base_url: &str, entity_id: Option<&str>) -> Result<String> {
        let path = match (self.requires_entity(), entity_id) {
            (true, Some(id)) => self.path.replace(ENTITY_PLACEHOLDER, id),
            (true, None) => {
                return Err(Error::MissingEntityId {
                    endpoint: self.name.to_string(),
                })
            }
            (false, Some(_)) => {
                return Err(Error::config(format!(
                    "endpoint '{}' does not take an entity id",
                    self.name
                )))
            }
            (false, None) => self.path.to_string(),
        };

        let url = format!("{}{path}", base_url.trim_end_matches('/'));
        url::Url::parse(&url)?;
        Ok(url)
    }
}

use EndpointPaging::{LinkHeader, RecentDeployments, Single};

/// Built-in endpoints keyed by name
pub static ENDPOINTS: LazyLock<BTreeMap<&'static str, Endpoint>> = LazyLock::new(|| {
    [
        // APM
        Endpoint::new("applications", "/v2/applications.json", "applications", LinkHeader),
        Endpoint::new(
            "application_hosts",
            "/v2/applications/{}/hosts.json",
            "application_hosts",
            LinkHeader,
        ),
        Endpoint::new(
            "application_instances",
            "/v2/applications/{}/instances.json",
            "application_instances",
            LinkHeader,
        ),
        Endpoint::new(
            "application_deployments",
            "/v2/applications/{}/deployments.json",
            "deployments",
            RecentDeployments,
        ),
        Endpoint::new("key_transactions", "/v2/key_transactions.json", "key_transactions", Single),
        // Mobile & browser
        Endpoint::new("mobile_applications", "/v2/mobile_applications.json", "applications", Single),
        Endpoint::new(
            "browser_applications",
            "/v2/browser_applications.json",
            "browser_applications",
            Single,
        ),
        // Account
        Endpoint::new("users", "/v2/users.json", "users", LinkHeader),
        Endpoint::new("plugins", "/v2/plugins.json", "plugins", LinkHeader),
        Endpoint::new("labels", "/v2/labels.json", "labels", LinkHeader),
        // Alerts
        Endpoint::new("alerts_events", "/v2/alerts_events.json", "recent_events", LinkHeader),
        Endpoint::new("alerts_policies", "/v2/alerts_policies.json", "policies", LinkHeader),
        Endpoint::new("alerts_channels", "/v2/alerts_channels.json", "channels", LinkHeader),
        Endpoint::new("alerts_conditions", "/v2/alerts_conditions.json", "conditions", LinkHeader),
        Endpoint::new(
            "alerts_plugins_conditions",
            "/v2/alerts_plugins_conditions.json",
            "conditions",
            LinkHeader,
        ),
        Endpoint::new(
            "external_service_conditions",
            "/v2/alerts_external_service_conditions.json",
            "conditions",
            LinkHeader,
        ),
        Endpoint::new(
            "alerts_synthetics_conditions",
            "/v2/alerts_synthetics_conditions.json",
            "conditions",
            LinkHeader,
        ),
        Endpoint::new(
            "alerts_nrql_conditions",
            "/v2/alerts_nrql_conditions.json",
            "conditions",
            LinkHeader,
        ),
        Endpoint::new(
            "alerts_entity_conditions",
            "/v2/alerts_entity_conditions/{}.json",
            "conditions",
            Single,
        ),
    ]
    .into_iter()
    .map(|endpoint| (endpoint.name, endpoint))
    .collect()
});

/// Look up an endpoint by name
pub fn get_endpoint(name: &str) -> Result<&'static Endpoint> {
    ENDPOINTS.get(name).ok_or_else(|| Error::UnknownEndpoint {
        name: name.to_string(),
    })
}

/// Check if a name is a known endpoint
pub fn is_endpoint(name: &str) -> bool {
    ENDPOINTS.contains_key(name)
}

/// All endpoint names, sorted
pub fn list_endpoints() -> Vec<&'static str> {
    ENDPOINTS.keys().copied().collect()
}
