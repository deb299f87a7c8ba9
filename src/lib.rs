//! # Tabletalk - Batch LLM Completions Over a Unified Message Model
//!
//! Tabletalk turns a table of prompts into a table of model responses. It
//! provides one conversation representation that renders into the wire
//! formats of multiple AI providers, a completion client with bounded retry
//! and concurrency admission, and a CSV batch runner on top.
//!
//! ## Features
//!
//! - **One message model**: a closed `Message` enum renders into each
//!   provider's request schema; rendering is a pure function, so one message
//!   can be reused across providers and attempts.
//! - **Typed failures**: every failure is a classified [`LlmError`]; a failed
//!   call is never reported as an empty success.
//! - **Bounded resilience**: transient failures retry with exponential
//!   backoff and jitter up to a hard attempt cap; fatal failures abort
//!   immediately.
//! - **Admission control**: a semaphore bounds in-flight requests per
//!   client, independent of how many trials the batch fans out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tabletalk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env(ProviderKind::OpenAi, "gpt-4-turbo")?;
//!     let params = GenerationParams::builder()
//!         .temperature(1.0)?
//!         .max_tokens(1000)
//!         .build();
//!     let client = CompletionClient::new(config, params)?;
//!
//!     let messages = vec![Message::user("Hello, world!")];
//!     let response = client.complete_resilient(&messages).await?;
//!     println!("{}", response.text());
//!
//!     Ok(())
//! }
//! ```
//!
//! Batch mode reads a CSV with a prompt column and writes one row per
//! sampled trial, appending `model_response`, `trial_id` and `error`
//! columns:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tabletalk::prelude::*;
//!
//! # async fn run(client: CompletionClient) -> Result<(), tabletalk::LlmError> {
//! let summary = run_batch(
//!     &client,
//!     Path::new("prompts.csv"),
//!     Path::new("responses.csv"),
//!     &BatchOptions::default(),
//! )
//! .await?;
//! println!("{} rows, {} failures", summary.rows, summary.failures);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod batch;
pub mod client;
pub mod encoding;
pub mod error;
pub mod limit;
pub mod providers;
pub mod retry;
pub mod types;
pub mod utils;

pub use batch::{BatchOptions, BatchSummary, run_batch};
pub use client::{ClientConfig, CompletionClient};
pub use error::{ErrorCategory, LlmError};
pub use limit::ConcurrencyLimiter;
pub use providers::ProviderKind;
pub use retry::{RetryExecutor, RetryPolicy};
pub use types::{
    CompletionResponse, FinishReason, GenerationParams, GenerationParamsBuilder,
    IMAGE_PLACEHOLDER, ImageSource, Message, ResponseMetadata, Usage,
};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::batch::{BatchOptions, BatchSummary, run_batch};
    pub use crate::client::{ClientConfig, CompletionClient};
    pub use crate::error::LlmError;
    pub use crate::providers::ProviderKind;
    pub use crate::retry::RetryPolicy;
    pub use crate::types::{
        CompletionResponse, GenerationParams, ImageSource, Message,
    };
    pub use crate::utils::strip_code_fence;
}
