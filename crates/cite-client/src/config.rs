//! Retrieval client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{CitationQuery, OutputMode, ScoreWeights};

/// Default service location when `CITE_ASSIST_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default library when `CITE_ASSIST_LIBRARY_ID` is unset.
pub const DEFAULT_LIBRARY_ID: u64 = 5_673_253;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 5_000;

/// Retrieval service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiteConfig {
    /// Service base URL, without trailing path
    pub base_url: String,
    /// Path of the search endpoint
    pub search_path: String,
    /// Path of the health endpoint
    pub health_path: String,
    /// Request timeout applied to every search unless the query overrides it
    pub timeout_ms: u64,
    /// Upper bound for the health check
    pub health_timeout_ms: u64,
    pub library_id: u64,
    pub max_results: u32,
    pub min_score: f64,
    pub output_mode: OutputMode,
    pub weights: ScoreWeights,
}

impl Default for CiteConfig {
    fn default() -> Self {
        CiteConfig {
            base_url: std::env::var("CITE_ASSIST_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            search_path: "/search".to_string(),
            health_path: "/health".to_string(),
            timeout_ms: timeout_ms_from_secs(std::env::var("CITE_ASSIST_TIMEOUT_SECS").ok()),
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            library_id: std::env::var("CITE_ASSIST_LIBRARY_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_LIBRARY_ID),
            max_results: 10,
            min_score: 0.3,
            output_mode: OutputMode::Chunks,
            weights: ScoreWeights::default(),
        }
    }
}

/// Milliseconds for a `CITE_ASSIST_TIMEOUT_SECS` value; default when unset or
/// unparsable.
fn timeout_ms_from_secs(value: Option<String>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(DEFAULT_TIMEOUT_MS)
}

impl CiteConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific server
    pub fn new(base_url: &str) -> Self {
        CiteConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_library(mut self, library_id: u64) -> Self {
        self.library_id = library_id;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    /// Build a query for `text` carrying this config's defaults.
    pub fn query(&self, text: impl Into<String>) -> CitationQuery {
        CitationQuery {
            text: text.into(),
            library_id: self.library_id,
            max_results: self.max_results,
            min_score: self.min_score,
            output_mode: self.output_mode,
            weights: self.weights,
            timeout: None,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CiteConfig::default();
        assert!(!config.base_url.is_empty());
        assert_eq!(config.search_path, "/search");
        assert!(config.timeout_ms > 0);
        assert!(config.health_timeout() <= config.timeout());
    }

    #[test]
    fn test_timeout_env_value_parsing() {
        assert_eq!(timeout_ms_from_secs(Some("45".to_string())), 45_000);
        assert_eq!(timeout_ms_from_secs(Some("soon".to_string())), DEFAULT_TIMEOUT_MS);
        assert_eq!(timeout_ms_from_secs(None), DEFAULT_TIMEOUT_MS);
        assert_eq!(timeout_ms_from_secs(Some(u64::MAX.to_string())), u64::MAX);
    }

    #[test]
    fn test_config_new_strips_trailing_slash() {
        let config = CiteConfig::new("http://cite.example.com/");
        assert_eq!(config.base_url, "http://cite.example.com");
        assert_eq!(config.url("/search"), "http://cite.example.com/search");
    }

    #[test]
    fn test_query_inherits_defaults() {
        let config = CiteConfig::new("http://cite.example.com")
            .with_library(7)
            .with_timeout(Duration::from_secs(2));
        let q = config.query("estoppel");
        assert_eq!(q.text, "estoppel");
        assert_eq!(q.library_id, 7);
        assert_eq!(q.max_results, config.max_results);
        assert_eq!(q.output_mode, OutputMode::Chunks);
        assert!(q.timeout.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_config_deserializes_partial_toml_shape() {
        let config: CiteConfig = serde_json::from_value(serde_json::json!({
            "base_url": "http://10.0.0.5:9000",
            "output_mode": "both",
            "weights": { "chunk": 0.5, "summary": 0.5 }
        }))
        .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.output_mode, OutputMode::Both);
        assert_eq!(config.weights.chunk, 0.5);
        assert_eq!(config.search_path, "/search");
    }
}
