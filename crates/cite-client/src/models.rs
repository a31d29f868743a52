//! Wire and domain models for the citation search service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RetrievalError;

/// How the service should shape its hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Auto,
    #[default]
    Chunks,
    Summaries,
    Both,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputMode::Auto => "auto",
            OutputMode::Chunks => "chunks",
            OutputMode::Summaries => "summaries",
            OutputMode::Both => "both",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OutputMode {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(OutputMode::Auto),
            "chunks" => Ok(OutputMode::Chunks),
            "summaries" => Ok(OutputMode::Summaries),
            "both" => Ok(OutputMode::Both),
            other => Err(RetrievalError::InvalidQuery(format!(
                "unknown output mode '{other}' (expected auto|chunks|summaries|both)"
            ))),
        }
    }
}

/// Blend weights between chunk-level and summary-level similarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub chunk: f64,
    pub summary: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            chunk: 0.7,
            summary: 0.3,
        }
    }
}

/// A semantic search query against one library.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationQuery {
    pub text: String,
    pub library_id: u64,
    pub max_results: u32,
    pub min_score: f64,
    pub output_mode: OutputMode,
    pub weights: ScoreWeights,
    /// Overrides the client-wide request timeout for this call only.
    pub timeout: Option<Duration>,
}

impl CitationQuery {
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject queries the service would refuse anyway.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.text.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "query text must not be empty".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(RetrievalError::InvalidQuery(
                "max_results must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(RetrievalError::InvalidQuery(format!(
                "min_score {} outside [0, 1]",
                self.min_score
            )));
        }
        for (name, w) in [("chunk", self.weights.chunk), ("summary", self.weights.summary)] {
            if !(0.0..=1.0).contains(&w) {
                return Err(RetrievalError::InvalidQuery(format!(
                    "{name} weight {w} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn to_request(&self) -> SearchRequest<'_> {
        SearchRequest {
            query: &self.text,
            library_id: self.library_id,
            max_results: self.max_results,
            min_score: self.min_score,
            output_mode: self.output_mode,
            weights: self.weights,
        }
    }
}

/// JSON body of `POST /search`.
#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
    pub library_id: u64,
    pub max_results: u32,
    pub min_score: f64,
    pub output_mode: OutputMode,
    pub weights: ScoreWeights,
}

/// A single hit from the citation database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationResult {
    /// Library item key
    pub id: String,
    pub title: String,
    /// `chunk` or `summary`
    pub result_type: String,
    /// Relevance, higher is better
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
}

impl CitationResult {
    /// Chunk text if present, else the summary, else empty.
    pub fn relevant_text(&self) -> &str {
        self.chunk_text
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or("")
    }
}

/// Body of a successful `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<CitationResult>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub query_time_ms: f64,
}

/// True when scores never increase from one hit to the next.
pub fn is_score_ordered(results: &[CitationResult]) -> bool {
    results.windows(2).all(|w| w[0].score >= w[1].score)
}

/// Bring results into non-increasing score order.
///
/// Already-ordered input is returned untouched. Otherwise a stable sort is
/// applied so hits with equal scores keep the order the service chose.
pub fn normalize_order(mut results: Vec<CitationResult>) -> Vec<CitationResult> {
    if !is_score_ordered(&results) {
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
    results
}
