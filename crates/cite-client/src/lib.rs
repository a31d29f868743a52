//! Cite-Client: Retrieval Layer for Ensemble Writer
//!
//! This crate talks to the semantic citation search service that grounds the
//! drafting phase in a local document corpus.
//!
//! ## Resilience contract
//!
//! - `search`: strict; distinguishes unreachable service, HTTP status errors
//!   and malformed bodies.
//! - `search_safe`: never fails; logs and returns an empty result set.
//! - `health_check`: bounded reachability check for diagnostics.
//!
//! Results always come back in non-increasing score order.

mod client;
mod config;
mod error;
mod models;

pub use client::{CitationSearch, CiteClient};
pub use config::{CiteConfig, DEFAULT_BASE_URL, DEFAULT_LIBRARY_ID};
pub use error::RetrievalError;
pub use models::{
    is_score_ordered, normalize_order, CitationQuery, CitationResult, OutputMode, ScoreWeights,
    SearchResponse,
};

/// Result type for cite-client operations
pub type Result<T> = std::result::Result<T, RetrievalError>;
