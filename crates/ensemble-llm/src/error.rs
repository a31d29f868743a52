//! Error types for provider backends

use std::time::Duration;

use ensemble_core::FailureKind;
use thiserror::Error;

/// Longest provider error body kept in [`LlmError::Api`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Error, Debug)]
pub enum LlmError {
    /// Connection refused, DNS or TLS failure
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// 401 or 403
    #[error("authentication failed: {0}")]
    ProviderAuth(String),

    /// 429
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Any other non-2xx status
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// 2xx with a body that is not the provider's response envelope
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Missing API key, unknown backend, client build failure
    #[error("misconfiguration: {0}")]
    Misconfigured(String),
}

impl LlmError {
    /// Map a non-2xx status to an error.
    pub fn from_status(provider: &str, status: u16, body: &str) -> Self {
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        match status {
            401 | 403 => LlmError::ProviderAuth(format!("{provider} returned {status}")),
            429 => LlmError::RateLimited(format!("{provider}: {body}")),
            _ => LlmError::Api {
                status,
                message: body,
            },
        }
    }

    /// Outcome classification for the phase executor.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            LlmError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::InvocationError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            LlmError::from_status("anthropic", 401, ""),
            LlmError::ProviderAuth(_)
        ));
        assert!(matches!(
            LlmError::from_status("openai", 403, ""),
            LlmError::ProviderAuth(_)
        ));
        assert!(matches!(
            LlmError::from_status("gemini", 429, "slow down"),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            LlmError::from_status("gemini", 529, "overloaded"),
            LlmError::Api { status: 529, .. }
        ));
    }

    #[test]
    fn test_error_body_is_truncated() {
        let long = "x".repeat(2_000);
        match LlmError::from_status("openai", 500, &long) {
            LlmError::Api { message, .. } => assert_eq!(message.len(), MAX_ERROR_BODY),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_failure_kind() {
        let timeout = LlmError::Timeout {
            duration: Duration::from_secs(1),
        };
        assert_eq!(timeout.failure_kind(), FailureKind::Timeout);
        assert_eq!(
            LlmError::RateLimited("x".to_string()).failure_kind(),
            FailureKind::InvocationError
        );
    }
}
