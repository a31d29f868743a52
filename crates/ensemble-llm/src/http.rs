//! Shared HTTP plumbing for the provider backends
//!
//! One `reqwest::Client` per backend. Each request carries its own timeout;
//! non-2xx statuses and transport failures are mapped to [`LlmError`]. No
//! retries here: the phase executor owns retry policy.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LlmError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, LlmError> {
        let client = Client::builder()
            .user_agent(concat!("ensemble-llm/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| LlmError::Misconfigured(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send `request` bounded by `timeout` and decode a 2xx JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        provider: &str,
    ) -> Result<T, LlmError> {
        debug!(provider, timeout_ms = timeout.as_millis() as u64, "sending provider request");

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout, provider))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(provider, status.as_u16(), &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout, provider))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| LlmError::InvalidResponse(format!("{provider}: {e}")))
    }
}

/// URLs are stripped so query-string credentials never reach logs.
fn transport_error(err: reqwest::Error, timeout: Duration, provider: &str) -> LlmError {
    if err.is_timeout() {
        return LlmError::Timeout { duration: timeout };
    }
    LlmError::Transport(format!("{provider} request failed: {}", err.without_url()))
}
