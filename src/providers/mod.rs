//! Provider Adapters
//!
//! One module per vendor API. Each adapter renders the normalized message
//! sequence and generation parameters into the provider's request schema and
//! normalizes the provider's response back into a [`CompletionResponse`].
//! Adding a provider means adding a module here plus one arm per dispatch
//! point; callers never change.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::types::message::Message;
use crate::types::params::GenerationParams;
use crate::types::response::CompletionResponse;

/// Supported provider APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Anthropic,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl ProviderKind {
    /// Construct a `ProviderKind` from a provider name string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "openai" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    /// Default API base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Full request URL for a chat completion against `model`.
    pub fn endpoint(&self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Self::OpenAi => format!("{base}/chat/completions"),
            Self::Gemini => format!("{base}/models/{model}:generateContent"),
            Self::Anthropic => format!("{base}/messages"),
        }
    }

    /// Request headers for this provider. The key is inserted here and
    /// nowhere else; it must never appear in logs or persisted output.
    pub fn build_headers(&self, api_key: &str) -> Result<reqwest::header::HeaderMap, LlmError> {
        match self {
            Self::OpenAi => openai::build_headers(api_key),
            Self::Gemini => gemini::build_headers(api_key),
            Self::Anthropic => anthropic::build_headers(api_key),
        }
    }

    /// Build the full request body for a conversation.
    pub fn build_request_body(
        &self,
        messages: &[Message],
        params: &GenerationParams,
        model: &str,
    ) -> Result<serde_json::Value, LlmError> {
        match self {
            Self::OpenAi => openai::build_request_body(messages, params, model),
            Self::Gemini => gemini::build_request_body(messages, params, model),
            Self::Anthropic => anthropic::build_request_body(messages, params, model),
        }
    }

    /// Normalize a raw provider response.
    pub fn parse_response(
        &self,
        raw: serde_json::Value,
    ) -> Result<CompletionResponse, LlmError> {
        match self {
            Self::OpenAi => openai::parse_response(raw),
            Self::Gemini => gemini::parse_response(raw),
            Self::Anthropic => anthropic::parse_response(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Gemini,
            ProviderKind::Anthropic,
        ] {
            assert_eq!(ProviderKind::from_name(&kind.to_string()), Some(kind));
        }
        assert_eq!(ProviderKind::from_name("cohere"), None);
    }

    #[test]
    fn endpoints_include_model_only_where_the_api_requires_it() {
        assert_eq!(
            ProviderKind::OpenAi.endpoint("https://api.openai.com/v1", "gpt-4-turbo"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            ProviderKind::Gemini
                .endpoint("https://generativelanguage.googleapis.com/v1beta", "gemini-pro"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );
    }
}
