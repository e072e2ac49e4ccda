//! HTTP client for the provider service.
//!
//! # Responsibilities
//! - Resolve the logical upstream to its configured base URL
//! - Issue GET requests and decode JSON or text bodies
//! - Map network, status and decode failures onto `TransportError`
//!
//! No retries and no overall deadline here; both belong to the command wrapper.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::client::types::{TransportError, TransportResult};
use crate::config::UpstreamConfig;

/// Client bound to one upstream service.
#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    service_name: String,
    base_url: Url,
}

impl RemoteClient {
    /// Create a client for the configured upstream.
    pub fn new(config: &UpstreamConfig) -> TransportResult<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            TransportError::InvalidUrl(format!("'{}': {}", config.base_url, e))
        })?;
        // Joins are relative to the base path only when it ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::info!(
            service = %config.service_name,
            base_url = %base_url,
            "Remote client initialized"
        );

        Ok(Self {
            client,
            service_name: config.service_name.clone(),
            base_url,
        })
    }

    /// GET `path` and deserialize the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> TransportResult<T> {
        let body = self.fetch(path).await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// GET `path` and return the raw body.
    pub async fn get_text(&self, path: &str) -> TransportResult<String> {
        self.fetch(path).await
    }

    fn url_for(&self, path: &str) -> TransportResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidUrl(format!("'{}': {}", path, e)))
    }

    async fn fetch(&self, path: &str) -> TransportResult<String> {
        let url = self.url_for(path)?;
        tracing::debug!(service = %self.service_name, url = %url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("service_name", &self.service_name)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
