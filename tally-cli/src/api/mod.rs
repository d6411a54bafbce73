//! API client module
//!
//! HTTP client for communicating with the Tally orchestrator API.

use anyhow::{Context, Result};
use reqwest::Client;
use tally_core::dto::job::{ErrorResponse, LaunchResponse};

/// HTTP client for the Tally orchestrator API
pub struct ApiClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API
    /// * `api_key` - Bearer token for administrative endpoints
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Launch a new run of the import job
    ///
    /// # Returns
    /// The launch acknowledgement with the new execution id
    pub async fn start_job(&self) -> Result<LaunchResponse> {
        let url = format!("{}/jobs/start", self.base_url);
        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to send start job request")?;

        self.handle_response(response).await
    }

    /// Check that the orchestrator is up
    pub async fn health(&self) -> Result<serde_json::Value> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send health request")?;

        self.handle_response(response).await
    }

    /// Handle API response and deserialize JSON
    ///
    /// # Arguments
    /// * `response` - The HTTP response
    ///
    /// # Returns
    /// The deserialized response body
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            anyhow::bail!("Request failed with status {}: {}", status, message);
        }

        response
            .json()
            .await
            .context("Failed to parse response JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/", None);
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
