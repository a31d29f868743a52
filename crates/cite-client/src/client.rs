//! HTTP client for the citation search service
//!
//! Exposes a strict entry point (`search`) that reports every failure, a safe
//! entry point (`search_safe`) that degrades to an empty result, and a
//! lightweight `health_check`.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::CiteConfig;
use crate::error::RetrievalError;
use crate::models::{is_score_ordered, normalize_order, CitationQuery, CitationResult, SearchResponse};
use crate::Result;

/// Longest error body kept in `RetrievalError::HttpStatus`.
const MAX_ERROR_BODY: usize = 512;

/// Anything that can answer citation queries.
///
/// The orchestrator depends on this seam rather than on [`CiteClient`] so
/// tests can substitute in-memory sources.
#[async_trait]
pub trait CitationSearch: Send + Sync {
    /// Strict search: every failure is returned to the caller.
    async fn search(&self, query: &CitationQuery) -> Result<Vec<CitationResult>>;

    /// Reachability check. Never fails; `false` means unreachable or unhealthy.
    async fn health_check(&self) -> bool;

    /// Search that never fails.
    ///
    /// Any error from [`CitationSearch::search`] is logged at `warn` and
    /// replaced by an empty result set.
    async fn search_safe(&self, query: &CitationQuery) -> Vec<CitationResult> {
        match self.search(query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, query = %query.text, "citation search failed, continuing without citations");
                Vec::new()
            }
        }
    }
}

/// Client for the citation search HTTP API
pub struct CiteClient {
    config: CiteConfig,
    http_client: reqwest::Client,
}

impl CiteClient {
    /// Create a new client
    pub fn new(config: CiteConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("ensemble-cite-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| RetrievalError::Misconfigured(e.to_string()))?;

        Ok(CiteClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(CiteConfig::from_env())
    }

    pub fn config(&self) -> &CiteConfig {
        &self.config
    }

    /// Query builder seeded with this client's defaults.
    pub fn query(&self, text: impl Into<String>) -> CitationQuery {
        self.config.query(text)
    }

    /// Run a search and return the full response envelope.
    ///
    /// Results are guaranteed to be in non-increasing score order.
    pub async fn search_response(&self, query: &CitationQuery) -> Result<SearchResponse> {
        query.validate()?;

        let url = self.config.url(&self.config.search_path);
        let timeout = query.timeout.unwrap_or_else(|| self.config.timeout());

        debug!(url = %url, library_id = query.library_id, "querying citation service");

        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .json(&query.to_request())
            .send()
            .await
            .map_err(|e| RetrievalError::from_transport(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(RetrievalError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetrievalError::from_transport(&url, e))?;

        let mut parsed: SearchResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RetrievalError::MalformedResponse(e.to_string()))?;

        if !is_score_ordered(&parsed.results) {
            warn!(
                results = parsed.results.len(),
                "citation service returned hits out of score order, normalizing"
            );
            parsed.results = normalize_order(parsed.results);
        }

        debug!(
            results = parsed.results.len(),
            total = parsed.total,
            query_time_ms = parsed.query_time_ms,
            "citation search completed"
        );

        Ok(parsed)
    }
}

#[async_trait]
impl CitationSearch for CiteClient {
    async fn search(&self, query: &CitationQuery) -> Result<Vec<CitationResult>> {
        self.search_response(query).await.map(|r| r.results)
    }

    async fn health_check(&self) -> bool {
        let url = self.config.url(&self.config.health_path);
        let timeout = self.config.health_timeout().min(self.config.timeout());

        match self.http_client.get(&url).timeout(timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "citation service health check failed");
                false
            }
        }
    }
}
