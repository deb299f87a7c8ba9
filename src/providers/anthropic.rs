//! Anthropic Messages API adapter.
//!
//! Wire format: user content is an array with `image` blocks (base64
//! source objects) before the text block. The internal `model` role maps
//! to `assistant`. Anthropic has no in-array system role: system content
//! is hoisted into the top-level `system` field, and `max_tokens` is a
//! required field of every request.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::encoding::encode_image;
use crate::error::LlmError;
use crate::types::message::{ImageSource, Message};
use crate::types::params::GenerationParams;
use crate::types::response::{CompletionResponse, FinishReason, ResponseMetadata, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// `max_tokens` used when the caller leaves it unset; Anthropic rejects
/// requests without one.
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub(crate) fn build_headers(api_key: &str) -> Result<HeaderMap, LlmError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "anthropic-version",
        HeaderValue::from_static(ANTHROPIC_VERSION),
    );
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|_| LlmError::InvalidInput("API key contains invalid header characters".into()))?;
    key.set_sensitive(true);
    headers.insert("x-api-key", key);
    Ok(headers)
}

/// Render one message into Anthropic's message object.
///
/// System messages are handled by [`build_request_body`]; rendering one here
/// is a caller error.
pub(crate) fn render_message(message: &Message) -> Result<Value, LlmError> {
    match message {
        Message::User { content, images, .. } => {
            let mut blocks = Vec::new();
            for image in images {
                blocks.push(render_image_block(image)?);
            }
            if let Some(text) = content {
                blocks.push(json!({"type": "text", "text": text}));
            }
            Ok(json!({"role": "user", "content": blocks}))
        }
        Message::Model { content, .. } => Ok(json!({"role": "assistant", "content": content})),
        Message::System { .. } => Err(LlmError::InvalidInput(
            "system messages are hoisted into the top-level system field".into(),
        )),
    }
}

fn render_image_block(image: &ImageSource) -> Result<Value, LlmError> {
    match image {
        ImageSource::Path(path) => {
            let encoded = encode_image(path)?;
            Ok(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": encoded.media_type,
                    "data": encoded.data
                }
            }))
        }
        ImageSource::Placeholder => Err(LlmError::InvalidInput(
            "unsubstituted image placeholder at render time".into(),
        )),
    }
}

pub(crate) fn build_request_body(
    messages: &[Message],
    params: &GenerationParams,
    model: &str,
) -> Result<Value, LlmError> {
    let mut rendered = Vec::new();
    let mut system_texts = Vec::new();
    for message in messages {
        if let Message::System { content, .. } = message {
            system_texts.push(content.clone());
        } else {
            rendered.push(render_message(message)?);
        }
    }

    let mut body = serde_json::Map::new();
    body.insert("model".into(), json!(model));
    body.insert(
        "max_tokens".into(),
        json!(params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
    );
    body.insert("messages".into(), Value::Array(rendered));
    if !system_texts.is_empty() {
        body.insert("system".into(), json!(system_texts.join("\n\n")));
    }

    // Anthropic supports only a subset of the tunables; the rest are
    // silently omitted.
    if let Some(temperature) = params.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = params.top_p {
        body.insert("top_p".into(), json!(top_p));
    }
    if let Some(stop) = &params.stop_sequences {
        body.insert("stop_sequences".into(), json!(stop));
    }

    Ok(Value::Object(body))
}

pub(crate) fn parse_response(raw: Value) -> Result<CompletionResponse, LlmError> {
    let blocks = raw
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::ParseError("response has no content blocks".into()))?;

    let text: String = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .concat();
    if text.is_empty() && blocks.is_empty() {
        return Err(LlmError::ParseError("response has no content blocks".into()));
    }

    let finish_reason = raw
        .get("stop_reason")
        .and_then(Value::as_str)
        .map(FinishReason::from_provider);

    let usage = raw.get("usage").map(|u| {
        let input = u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
        let output = u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32;
        Usage::new(input, output)
    });

    let metadata = ResponseMetadata {
        id: raw.get("id").and_then(Value::as_str).map(str::to_string),
        model: raw.get("model").and_then(Value::as_str).map(str::to_string),
        created: None,
        fingerprint: None,
    };

    Ok(CompletionResponse {
        texts: vec![text],
        finish_reason,
        usage,
        metadata,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn images_render_before_the_text_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.jpg");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"jpg-bytes")
            .unwrap();

        let msg = Message::user_with_images("describe", vec![ImageSource::path(&path)]);
        let rendered = render_message(&msg).unwrap();
        let blocks = rendered["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["type"], "image");
        assert_eq!(blocks[0]["source"]["type"], "base64");
        assert_eq!(blocks[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(blocks[1]["type"], "text");
        assert_eq!(blocks[1]["text"], "describe");
    }

    #[test]
    fn model_role_maps_to_assistant() {
        let rendered = render_message(&Message::model("hi")).unwrap();
        assert_eq!(rendered["role"], "assistant");
        assert_eq!(rendered["content"], "hi");
    }

    #[test]
    fn system_message_is_not_renderable_inline() {
        assert!(matches!(
            render_message(&Message::system("be terse")),
            Err(LlmError::InvalidInput(_))
        ));
    }

    #[test]
    fn system_content_is_hoisted_to_top_level() {
        let messages = [Message::system("be terse"), Message::user("hi")];
        let body =
            build_request_body(&messages, &GenerationParams::default(), "claude-3-sonnet").unwrap();
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn max_tokens_is_always_present() {
        let body = build_request_body(
            &[Message::user("hi")],
            &GenerationParams::default(),
            "claude-3-sonnet",
        )
        .unwrap();
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);

        let params = GenerationParams::builder().max_tokens(500).build();
        let body = build_request_body(&[Message::user("hi")], &params, "claude-3-sonnet").unwrap();
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn unsupported_tunables_are_omitted() {
        let params = GenerationParams::builder()
            .temperature(0.3)
            .unwrap()
            .presence_penalty(0.5)
            .unwrap()
            .n(3)
            .seed(7)
            .build();
        let body = build_request_body(&[Message::user("hi")], &params, "claude-3-sonnet").unwrap();
        assert_eq!(body["temperature"], 0.3);
        assert!(body.get("presence_penalty").is_none());
        assert!(body.get("n").is_none());
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn parse_extracts_text_usage_and_stop_reason() {
        let raw = json!({
            "id": "msg_01",
            "model": "claude-3-sonnet",
            "content": [{"type": "text", "text": "hello there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        });
        let response = parse_response(raw).unwrap();
        assert_eq!(response.text(), "hello there");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.total_tokens, 15);
        assert_eq!(response.metadata.id.as_deref(), Some("msg_01"));
    }

    #[test]
    fn parse_rejects_missing_content() {
        assert!(matches!(
            parse_response(json!({"id": "msg_02"})),
            Err(LlmError::ParseError(_))
        ));
    }
}
