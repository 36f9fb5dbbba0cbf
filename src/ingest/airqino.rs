/// AirQino Data API Client
///
/// Issues the single upstream GET behind each façade request and buffers
/// the reply into an `UpstreamResponse`. Decoding is left to `translate`.
///
/// API host: https://airqino-api.magentalab.it

use std::time::Duration;

use crate::config::ConfigError;
use crate::model::{FacadeError, RequestParameters, UpstreamResponse};
use crate::operations::{self, Operation};

// ============================================================================
// Client
// ============================================================================

/// Shared handle to the upstream API.
///
/// Cheap to clone: `reqwest::Client` pools connections internally.
#[derive(Debug, Clone)]
pub struct AirqinoClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AirqinoClient {
    /// Builds a client whose every request is bounded by `timeout`
    /// (connect, headers and body together).
    ///
    /// Fails only at startup, when TLS or client settings cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("airqino_service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves `operation` against this client's base URL and fetches it.
    ///
    /// A missing parameter fails before any connection is opened.
    pub async fn fetch_operation(
        &self,
        operation: Operation,
        params: &RequestParameters,
    ) -> Result<UpstreamResponse, FacadeError> {
        let url = operations::build_upstream_url(&self.base_url, operation, params)?;
        self.fetch(&url).await
    }

    /// GETs `url` and buffers the whole response.
    ///
    /// Non-2xx statuses are returned as data, not as errors; status
    /// classification belongs to the translator.
    pub async fn fetch(&self, url: &str) -> Result<UpstreamResponse, FacadeError> {
        tracing::debug!(%url, "upstream request");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        tracing::debug!(%url, status, bytes = body.len(), "upstream response");

        Ok(UpstreamResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }

    fn classify(&self, err: reqwest::Error) -> FacadeError {
        if err.is_timeout() {
            FacadeError::UpstreamTimeout(self.timeout.as_secs())
        } else {
            FacadeError::UpstreamUnreachable(err.to_string())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
