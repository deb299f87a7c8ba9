//! Small output-normalization helpers.

pub mod fence;

pub use fence::strip_code_fence;
