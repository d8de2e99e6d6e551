//! REST API client for the OctoPrint HTTP endpoints.
//!
//! [`Gateway`] is the narrow I/O seam the poller, dispatcher and file
//! browser depend on; [`OctoPrintApi`] implements it with [`reqwest`].

use std::sync::Arc;

use async_trait::async_trait;
use printdeck_core::{ErrorClass, GatewayError, RawJobStatus};

use crate::config::ConfigProvider;

/// Remote printer server.
///
/// Paths are relative to the API base URL (`"job"`, `"plugin/preheat"`).
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET` a path and return the JSON body.
    async fn get_json(&self, path: &str) -> Result<serde_json::Value, GatewayError>;

    /// `POST` a JSON body to a path, discarding the response body.
    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), GatewayError>;

    /// `GET /api/job`.
    async fn job_status(&self) -> Result<RawJobStatus, GatewayError> {
        let value = self.get_json("job").await?;
        serde_json::from_value(value)
            .map_err(|e| GatewayError::unclassified(format!("Malformed job status: {e}")))
    }
}

/// Errors from the OctoPrint REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum OctoPrintApiError {
    /// The HTTP request itself failed (network, DNS, timeout, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// OctoPrint returned a non-2xx status code.
    #[error("OctoPrint API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<OctoPrintApiError> for GatewayError {
    fn from(err: OctoPrintApiError) -> Self {
        let message = err.to_string();
        match err {
            OctoPrintApiError::ApiError { status, .. } => GatewayError::http(status, message),
            OctoPrintApiError::Request(e) if e.is_timeout() || e.is_connect() => {
                GatewayError::transport(message)
            }
            OctoPrintApiError::Request(e) => GatewayError {
                status: e.status().map(|s| s.as_u16()),
                class: e
                    .status()
                    .map_or(ErrorClass::Unclassified, |s| ErrorClass::from_status(s.as_u16())),
                message,
            },
        }
    }
}

/// HTTP client for a single OctoPrint instance.
pub struct OctoPrintApi {
    client: reqwest::Client,
    config: Arc<dyn ConfigProvider>,
}

impl OctoPrintApi {
    /// Create a new API client with the configured request timeout.
    pub fn new(config: Arc<dyn ConfigProvider>) -> Result<Self, OctoPrintApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    async fn fetch_json(&self, path: &str) -> Result<serde_json::Value, OctoPrintApiError> {
        let response = self
            .client
            .get(self.config.url(path))
            .headers(self.config.request_headers())
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn send_post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), OctoPrintApiError> {
        let response = self
            .client
            .post(self.config.url(path))
            .headers(self.config.request_headers())
            .json(body)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`OctoPrintApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, OctoPrintApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(OctoPrintApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Gateway for OctoPrintApi {
    async fn get_json(&self, path: &str) -> Result<serde_json::Value, GatewayError> {
        self.fetch_json(path).await.map_err(|e| {
            tracing::debug!(path, error = %e, "OctoPrint GET failed");
            GatewayError::from(e)
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), GatewayError> {
        self.send_post(path, &body).await.map_err(|e| {
            tracing::debug!(path, error = %e, "OctoPrint POST failed");
            GatewayError::from(e)
        })
    }
}
