//! Image Embedding Module
//!
//! Providers accept images as base64-encoded inline data with an explicit
//! MIME type. Encoding is a pure function of the file path; an unreadable
//! file is a hard error, never an empty payload, since a silently empty
//! image block would corrupt the request sent to the provider.

use std::path::Path;

use base64::Engine;

use crate::error::LlmError;

/// A base64-encoded image ready for inline embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// MIME type, e.g. `image/png`
    pub media_type: String,
    /// Base64-encoded file contents (standard alphabet, padded)
    pub data: String,
}

/// Read and base64-encode an image file.
pub fn encode_image(path: &Path) -> Result<EncodedImage, LlmError> {
    let bytes = std::fs::read(path)
        .map_err(|e| LlmError::IoError(format!("failed to read image {}: {e}", path.display())))?;

    let media_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "image/png".to_string());

    Ok(EncodedImage {
        media_type,
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}
