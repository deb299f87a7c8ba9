//! Core data types: messages, generation parameters, normalized responses.

pub mod message;
pub mod params;
pub mod response;

pub use message::{IMAGE_PLACEHOLDER, ImageSource, Message};
pub use params::{GenerationParams, GenerationParamsBuilder};
pub use response::{CompletionResponse, FinishReason, ResponseMetadata, Usage};
