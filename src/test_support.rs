//! Shared helpers for unit tests

use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig, HttpRequest, RawResponse, Transport};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(usize, &HttpRequest) -> Result<RawResponse> + Send + Sync;

/// Transport that answers from a closure and records every request
pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// The handler receives the zero-based call index and the request
    pub(crate) fn new(
        handler: impl Fn(usize, &HttpRequest) -> Result<RawResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.handler)(index, request)
    }
}

/// Client over a scripted transport with default (no delay) retry settings
pub(crate) fn scripted_client(transport: &Arc<ScriptedTransport>) -> HttpClient {
    HttpClient::with_transport(transport.clone(), HttpClientConfig::default())
}

/// 200 response with a JSON body
pub(crate) fn json_response(body: &serde_json::Value) -> RawResponse {
    RawResponse::new(200, serde_json::to_vec(body).unwrap())
}
