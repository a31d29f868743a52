//! Error types for cite-client

use thiserror::Error;

/// Errors raised by the strict retrieval entry points.
///
/// `search_safe` swallows every variant; callers of `search` must branch on
/// them.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Connection refused, DNS failure or request timeout
    #[error("retrieval service unavailable at {url}: {reason}")]
    ServiceUnavailable { url: String, reason: String },

    /// Service answered with a 4xx/5xx status
    #[error("retrieval service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Body did not parse into the search response contract
    #[error("malformed retrieval response: {0}")]
    MalformedResponse(String),

    /// Query rejected before any request was sent
    #[error("invalid citation query: {0}")]
    InvalidQuery(String),

    /// HTTP client could not be constructed
    #[error("retrieval client misconfigured: {0}")]
    Misconfigured(String),
}

impl RetrievalError {
    /// Classify a transport-level reqwest failure.
    ///
    /// Status errors are handled before this is reached, so anything other
    /// than a body decode failure counts as the service being unreachable.
    pub(crate) fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return RetrievalError::MalformedResponse(err.to_string());
        }
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        RetrievalError::ServiceUnavailable {
            url: url.to_string(),
            reason,
        }
    }

    /// Whether this failure means the service could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RetrievalError::ServiceUnavailable { .. })
    }
}
