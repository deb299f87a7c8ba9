//! Error Handling Module
//!
//! Core error type for the library. Variants carry owned strings so the enum
//! stays `Clone`, which the retry executor relies on to keep the last failure
//! across attempts.
//!
//! # Example
//!
//! ```rust
//! use tabletalk::error::{ErrorCategory, LlmError};
//!
//! let error = LlmError::api_error(503, "service unavailable");
//! assert_eq!(error.category(), ErrorCategory::Server);
//! assert!(error.is_retryable());
//! ```

use reqwest::header::HeaderMap;

/// Errors that can occur while building or executing a completion call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Provider returned a non-success HTTP status
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Invalid or rejected credentials
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Provider rate limit hit
    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    /// Account quota exhausted
    #[error("Quota exceeded: {0}")]
    QuotaExceededError(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out: {0}")]
    TimeoutError(String),

    /// Could not reach the provider
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Transport-level failure not covered by a more specific variant
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response body did not match the provider's documented schema
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// JSON serialization/deserialization failure
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Local file I/O failure (e.g. an unreadable image reference)
    #[error("I/O error: {0}")]
    IoError(String),

    /// A generation parameter outside its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    InternalError(String),

    /// All retry attempts consumed; `last` is the final attempt's failure
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },
}

/// Coarse error category used for retry decisions and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Quota,
    Client,
    Server,
    Network,
    Parsing,
    Validation,
    Exhausted,
    Unknown,
}

impl LlmError {
    /// Create an API error without structured details
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create an API error with structured details
    pub fn api_error_with_details(
        code: u16,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// HTTP status code associated with this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::AuthenticationError(_) => Some(401),
            Self::RateLimitError(_) => Some(429),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Categorize the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationError(_) => ErrorCategory::Authentication,
            Self::RateLimitError(_) => ErrorCategory::RateLimit,
            Self::QuotaExceededError(_) => ErrorCategory::Quota,
            Self::ApiError { code, .. } if (500..=599).contains(code) => ErrorCategory::Server,
            Self::ApiError { .. } => ErrorCategory::Client,
            Self::TimeoutError(_) | Self::ConnectionError(_) | Self::HttpError(_) => {
                ErrorCategory::Network
            }
            Self::ParseError(_) | Self::JsonError(_) => ErrorCategory::Parsing,
            Self::InvalidParameter(_) | Self::InvalidInput(_) => ErrorCategory::Validation,
            Self::NotFound(_) => ErrorCategory::Client,
            Self::IoError(_) => ErrorCategory::Client,
            Self::RetriesExhausted { .. } => ErrorCategory::Exhausted,
            Self::InternalError(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the retry controller may re-attempt after this error.
    ///
    /// Transient transport and provider failures are retryable; contract
    /// violations, credential problems and exhausted quotas are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Server
                | ErrorCategory::Network
                | ErrorCategory::Parsing
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Classify an HTTP failure into a more specific error type.
///
/// Inspects the status code, response body and headers to derive a
/// better-typed `LlmError` (e.g. `RateLimitError` / `QuotaExceededError`)
/// rather than a generic `ApiError`. Provider-agnostic heuristics.
pub fn classify_http_error(
    provider_id: &str,
    status: u16,
    body_text: &str,
    headers: &HeaderMap,
) -> LlmError {
    let lower = body_text.to_lowercase();
    // Limit body sample size to avoid noisy logs
    let body_sample = body_text.chars().take(200).collect::<String>();

    if status == 429 {
        let retry_after = headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        return LlmError::RateLimitError(format!(
            "provider={provider_id} http=429 retry_after={retry_after} body_sample={body_sample}"
        ));
    }

    if status == 401 {
        return LlmError::AuthenticationError(format!(
            "provider={provider_id} unauthorized body_sample={body_sample}"
        ));
    }

    if status == 404 {
        return LlmError::NotFound(format!(
            "provider={provider_id} http=404 body_sample={body_sample}"
        ));
    }

    // Quota/rate envelopes sometimes arrive as 403/400
    if status == 403 || status == 400 {
        let quota_like = lower.contains("quota") || lower.contains("exceed");
        let rate_like = lower.contains("rate limit")
            || lower.contains("ratelimit")
            || lower.contains("resource_exhausted")
            || lower.contains("rate_limit_exceeded");
        if quota_like {
            return LlmError::QuotaExceededError(format!("provider={provider_id} quota exceeded"));
        }
        if rate_like {
            return LlmError::RateLimitError(format!("provider={provider_id} rate limited"));
        }
    }

    if status == 403 {
        return LlmError::AuthenticationError(format!(
            "provider={provider_id} forbidden body_sample={body_sample}"
        ));
    }
    if status == 400 {
        return LlmError::InvalidInput(format!(
            "provider={provider_id} bad request body_sample={body_sample}"
        ));
    }

    // 5xx is retryable via is_retryable()
    if (500..=599).contains(&status) {
        return LlmError::api_error(status, format!("provider={provider_id} server error"));
    }

    let details = match serde_json::from_str::<serde_json::Value>(body_text) {
        Ok(json) => serde_json::json!({
            "status": status,
            "provider": provider_id,
            "response": json,
        }),
        Err(_) => serde_json::json!({
            "status": status,
            "provider": provider_id,
            "raw": body_text,
        }),
    };
    LlmError::api_error_with_details(status, body_sample, details)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        assert!(LlmError::RateLimitError("429".into()).is_retryable());
        assert!(LlmError::api_error(500, "server error").is_retryable());
        assert!(LlmError::TimeoutError("deadline".into()).is_retryable());
        assert!(LlmError::ParseError("missing choices".into()).is_retryable());
    }

    #[test]
    fn fatal_errors_are_not_retryable() {
        assert!(!LlmError::AuthenticationError("bad key".into()).is_retryable());
        assert!(!LlmError::QuotaExceededError("quota".into()).is_retryable());
        assert!(!LlmError::InvalidParameter("temperature".into()).is_retryable());
        assert!(!LlmError::api_error(422, "unprocessable").is_retryable());
        let exhausted = LlmError::RetriesExhausted {
            attempts: 3,
            last: Box::new(LlmError::RateLimitError("429".into())),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn classify_maps_common_statuses() {
        let headers = HeaderMap::new();
        assert!(matches!(
            classify_http_error("openai", 429, "rate limit", &headers),
            LlmError::RateLimitError(_)
        ));
        assert!(matches!(
            classify_http_error("openai", 401, "unauthorized", &headers),
            LlmError::AuthenticationError(_)
        ));
        assert!(matches!(
            classify_http_error("gemini", 403, "quota exceeded for project", &headers),
            LlmError::QuotaExceededError(_)
        ));
        match classify_http_error("anthropic", 500, "oops", &headers) {
            LlmError::ApiError { code, .. } => assert_eq!(code, 500),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }
}
