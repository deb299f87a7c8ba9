//! Generation parameter types.
//!
//! `GenerationParams` is the flat set of sampling tunables attached to a
//! client at construction. Every field is independently defaulted; tunables
//! a provider does not support are silently omitted from its request body.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Sampling and output-control parameters.
///
/// Immutable for the lifetime of the client that holds them.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationParams {
    /// Temperature (0.0 to 2.0)
    pub temperature: Option<f64>,

    /// Nucleus sampling probability mass (0.0 to 1.0)
    pub top_p: Option<f64>,

    /// Maximum output tokens
    pub max_tokens: Option<u32>,

    /// Frequency penalty (-2.0 to 2.0)
    pub frequency_penalty: Option<f64>,

    /// Presence penalty (-2.0 to 2.0)
    pub presence_penalty: Option<f64>,

    /// Per-token logit bias (-100 to 100 per entry)
    pub logit_bias: Option<HashMap<String, i32>>,

    /// Whether to return log-probabilities
    pub logprobs: Option<bool>,

    /// Number of top log-probabilities per position (requires `logprobs`)
    pub top_logprobs: Option<u32>,

    /// Number of completions to sample; all candidates are surfaced
    pub n: Option<u32>,

    /// Random seed for reproducibility
    pub seed: Option<u64>,

    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
}

impl GenerationParams {
    /// Create a builder.
    pub fn builder() -> GenerationParamsBuilder {
        GenerationParamsBuilder::default()
    }
}

/// Builder for [`GenerationParams`] with range validation.
#[derive(Debug, Clone, Default)]
pub struct GenerationParamsBuilder {
    params: GenerationParams,
}

impl GenerationParamsBuilder {
    /// Set the temperature with validation.
    pub fn temperature(mut self, temperature: f64) -> Result<Self, LlmError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(LlmError::InvalidParameter(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        self.params.temperature = Some(temperature);
        Ok(self)
    }

    /// Set `top_p` with validation.
    pub fn top_p(mut self, top_p: f64) -> Result<Self, LlmError> {
        if !(0.0..=1.0).contains(&top_p) {
            return Err(LlmError::InvalidParameter(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }
        self.params.top_p = Some(top_p);
        Ok(self)
    }

    /// Set the frequency penalty with validation.
    pub fn frequency_penalty(mut self, penalty: f64) -> Result<Self, LlmError> {
        if !(-2.0..=2.0).contains(&penalty) {
            return Err(LlmError::InvalidParameter(
                "frequency_penalty must be between -2.0 and 2.0".to_string(),
            ));
        }
        self.params.frequency_penalty = Some(penalty);
        Ok(self)
    }

    /// Set the presence penalty with validation.
    pub fn presence_penalty(mut self, penalty: f64) -> Result<Self, LlmError> {
        if !(-2.0..=2.0).contains(&penalty) {
            return Err(LlmError::InvalidParameter(
                "presence_penalty must be between -2.0 and 2.0".to_string(),
            ));
        }
        self.params.presence_penalty = Some(penalty);
        Ok(self)
    }

    /// Set the maximum output tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.params.max_tokens = Some(max_tokens);
        self
    }

    /// Set per-token logit bias.
    pub fn logit_bias(mut self, bias: HashMap<String, i32>) -> Self {
        self.params.logit_bias = Some(bias);
        self
    }

    /// Request log-probabilities.
    pub fn logprobs(mut self, logprobs: bool) -> Self {
        self.params.logprobs = Some(logprobs);
        self
    }

    /// Number of top log-probabilities per position.
    pub fn top_logprobs(mut self, top_logprobs: u32) -> Self {
        self.params.top_logprobs = Some(top_logprobs);
        self
    }

    /// Number of completions to sample.
    pub fn n(mut self, n: u32) -> Self {
        self.params.n = Some(n);
        self
    }

    /// Random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.params.seed = Some(seed);
        self
    }

    /// Stop sequences.
    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.params.stop_sequences = Some(sequences);
        self
    }

    /// Finish the builder.
    pub fn build(self) -> GenerationParams {
        self.params
    }
}
