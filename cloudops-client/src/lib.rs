//! CloudOps HTTP Client
//!
//! A typed HTTP client for the CloudOps orchestrator API, shared by the runner
//! and the CLI.
//!
//! # Example
//!
//! ```no_run
//! use cloudops_client::OrchestratorClient;
//! use cloudops_core::domain::config::DockerJobConfig;
//! use cloudops_core::domain::job::JobRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let created = client
//!         .submit_job("res-1", JobRequest::GenerateDocker(DockerJobConfig::default()))
//!         .await?;
//!
//!     println!("Queued job: {}", created.job_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod resources;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// HTTP client for the CloudOps orchestrator API
///
/// Methods are grouped by concern:
/// - Job submission, status, cancellation and waiting
/// - Runner-side queue operations (list, claim, heartbeat, complete)
/// - Resource records
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client around a preconfigured reqwest `Client`
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Deserialize the JSON body of a successful response
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status of a response without a body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        ensure_success(response).await.map(|_| ())
    }

    /// Like [`Self::handle_response`] but maps 404 to `None`
    async fn handle_optional_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }
}

/// Turns a non-2xx response into [`ClientError::ApiError`]
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::api_error(status.as_u16(), error_message(&body)))
}

/// Extracts `error` from the orchestrator's `{ "error": ... }` body
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "Unknown error".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OrchestratorClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error":"Job not found"}"#), "Job not found");
        assert_eq!(error_message("gateway timeout\n"), "gateway timeout");
        assert_eq!(error_message(""), "Unknown error");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
