//! Normalized completion results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    /// Input tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Output tokens generated
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl Usage {
    /// Create usage statistics; `total` defaults to the sum.
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Reason why the model stopped generating tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Completed naturally or hit a stop sequence the provider reports as stop
    Stop,
    /// Hit the max output token limit
    Length,
    /// Stopped on a caller-supplied stop sequence (Anthropic reports this distinctly)
    StopSequence,
    /// Output blocked by the provider's content filter
    ContentFilter,
    /// Provider-specific reason that maps to nothing above
    Other(String),
}

impl FinishReason {
    /// Map a provider's finish-reason token to the normalized enum.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "STOP" => Self::Stop,
            "length" | "max_tokens" | "MAX_TOKENS" => Self::Length,
            "stop_sequence" => Self::StopSequence,
            "content_filter" | "SAFETY" | "refusal" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Response identity metadata, retained for auditing.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResponseMetadata {
    /// Provider-assigned response ID
    pub id: Option<String>,
    /// Model that produced the response
    pub model: Option<String>,
    /// Creation time reported by the provider
    pub created: Option<DateTime<Utc>>,
    /// Model fingerprint / backend version, where the provider reports one
    pub fingerprint: Option<String>,
}

/// Normalized result of a completion call.
///
/// All sampled candidates are surfaced; the minimal contract reads the first
/// via [`CompletionResponse::text`]. The provider's full response object is
/// kept in `raw` as an opaque audit handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    /// Candidate texts, in provider order; never empty for a parsed response
    pub texts: Vec<String>,
    /// Finish reason of the first candidate
    pub finish_reason: Option<FinishReason>,
    /// Token usage, when the provider reports it
    pub usage: Option<Usage>,
    /// Response identity metadata
    pub metadata: ResponseMetadata,
    /// The provider's full response object
    pub raw: serde_json::Value,
}

impl CompletionResponse {
    /// Primary completion text (the first candidate).
    pub fn text(&self) -> &str {
        self.texts.first().map(String::as_str).unwrap_or("")
    }
}
