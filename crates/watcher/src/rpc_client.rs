use crate::error::TransportError;
use async_trait::async_trait;
use tracing::debug;

/// Fetches raw response bodies from the node.
///
/// One call is one request: implementations must not retry or time out on
/// their own, the supervisor of the watcher owns that policy.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointClient for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::new(url, e.to_string()))?;

        // Error statuses still carry a body; whether it parses is the caller's call.
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(url, e.to_string()))?;

        debug!(url, %status, bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}
