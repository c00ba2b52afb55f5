//! Error taxonomy for retrieval and field coercion.

use thiserror::Error;

/// Failure of a single page request against the feature service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// HTTP 429, or a service error object carrying code 429.
    #[error("rate limited by feature service")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection or other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The body was not a valid feature page.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A 2xx response whose body carried an `error` object.
    #[error("feature service error {code}: {message}")]
    Service { code: i64, message: String },
}

impl FetchError {
    /// Whether the loop should pause and retry the same offset.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                FetchError::RateLimited
            } else {
                FetchError::Status(status.as_u16())
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Why a date-like attribute kept its original value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// The value is not numeric (string, bool, array, object).
    #[error("not a millisecond timestamp (found {0})")]
    NotATimestamp(&'static str),

    /// Numeric, but outside the representable date range.
    #[error("timestamp {0} is out of range")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_retries() {
        assert!(FetchError::RateLimited.is_rate_limit());
        assert!(!FetchError::Status(500).is_rate_limit());
        assert!(!FetchError::Timeout.is_rate_limit());
        assert!(!FetchError::Service {
            code: 400,
            message: "bad where".to_string()
        }
        .is_rate_limit());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            FetchError::Status(503).to_string(),
            "unexpected HTTP status 503"
        );
        assert_eq!(
            CoercionError::NotATimestamp("string").to_string(),
            "not a millisecond timestamp (found string)"
        );
    }
}
