//! Conversation message types.
//!
//! A [`Message`] is one immutable turn of a conversation. Rendering into a
//! provider's wire shape is a pure function of the message, so one instance
//! can be rendered repeatedly and against multiple providers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LlmError;
use crate::providers::ProviderKind;

/// Reserved literal standing in for an image that an external collaborator
/// substitutes before rendering.
pub const IMAGE_PLACEHOLDER: &str = "{{image}}";

/// An image reference inside a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// A concrete image file to embed as base64 inline data
    Path(PathBuf),
    /// The `{{image}}` placeholder, to be substituted before rendering
    Placeholder,
}

impl ImageSource {
    /// A concrete path reference.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Parse a raw string spec from lenient upstream input.
    ///
    /// The placeholder literal maps to [`ImageSource::Placeholder`]. Any
    /// other string is flagged as invalid but accepted and treated as a
    /// path; construction never fails on it. A genuinely unreadable path
    /// still fails at render time.
    pub fn from_spec(spec: &str) -> Self {
        if spec == IMAGE_PLACEHOLDER {
            Self::Placeholder
        } else {
            warn!(
                spec = %spec,
                "image entry is neither a path nor the '{{{{image}}}}' placeholder; treating as path"
            );
            Self::Path(PathBuf::from(spec))
        }
    }
}

/// One turn of a conversation.
///
/// A closed set of variants; adding a provider extends each variant's
/// rendering, not this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// End-user turn; may carry text, images, or both
    User {
        turn: u32,
        content: Option<String>,
        images: Vec<ImageSource>,
    },
    /// Model (assistant) turn
    Model { turn: u32, content: String },
    /// System instruction
    System { turn: u32, content: String },
}

impl Message {
    /// Text-only user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            turn: 0,
            content: Some(content.into()),
            images: Vec::new(),
        }
    }

    /// User message with text and images.
    pub fn user_with_images(content: impl Into<String>, images: Vec<ImageSource>) -> Self {
        Self::User {
            turn: 0,
            content: Some(content.into()),
            images,
        }
    }

    /// Image-only user message.
    pub fn user_images(images: Vec<ImageSource>) -> Self {
        Self::User {
            turn: 0,
            content: None,
            images,
        }
    }

    /// Model (assistant) message.
    pub fn model(content: impl Into<String>) -> Self {
        Self::Model {
            turn: 0,
            content: content.into(),
        }
    }

    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            turn: 0,
            content: content.into(),
        }
    }

    /// Set the conversation-order index. Ordering/display only; the call
    /// itself preserves the order messages are passed in.
    pub fn with_turn(mut self, turn: u32) -> Self {
        match &mut self {
            Self::User { turn: t, .. } | Self::Model { turn: t, .. } | Self::System { turn: t, .. } => {
                *t = turn;
            }
        }
        self
    }

    /// Conversation-order index.
    pub fn turn(&self) -> u32 {
        match self {
            Self::User { turn, .. } | Self::Model { turn, .. } | Self::System { turn, .. } => *turn,
        }
    }

    /// Text content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::User { content, .. } => content.as_deref(),
            Self::Model { content, .. } | Self::System { content, .. } => Some(content),
        }
    }

    /// Whether this is a system message.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    /// Render this message into `provider`'s wire shape.
    ///
    /// Pure: the same instance renders to the identical payload every time.
    /// System messages only render for providers with an in-array system
    /// role; for the others the request builder hoists them into the
    /// provider's dedicated system field and this returns `InvalidInput`.
    pub fn render(&self, provider: ProviderKind) -> Result<serde_json::Value, LlmError> {
        match provider {
            ProviderKind::OpenAi => crate::providers::openai::render_message(self),
            ProviderKind::Gemini => crate::providers::gemini::render_message(self),
            ProviderKind::Anthropic => crate::providers::anthropic::render_message(self),
        }
    }

    /// Short preview of the message for log lines.
    pub(crate) fn preview(&self, max_chars: usize) -> String {
        let text = self.content().unwrap_or("<no text>");
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            text.chars().take(max_chars).collect()
        }
    }
}
