//! Gemini generateContent adapter.
//!
//! Wire format: each message is a `Content` with a `parts` array; image
//! parts (`inline_data`) come before the text part. Roles are `user` and
//! `model`. Gemini has no in-array system role: system content is hoisted
//! into `systemInstruction` by the request builder, and tunables live under
//! `generationConfig`.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::encoding::encode_image;
use crate::error::LlmError;
use crate::types::message::{ImageSource, Message};
use crate::types::params::GenerationParams;
use crate::types::response::{CompletionResponse, FinishReason, ResponseMetadata, Usage};

pub(crate) fn build_headers(api_key: &str) -> Result<HeaderMap, LlmError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|_| LlmError::InvalidInput("API key contains invalid header characters".into()))?;
    key.set_sensitive(true);
    headers.insert("x-goog-api-key", key);
    Ok(headers)
}

/// Render one message into a Gemini `Content` object.
///
/// System messages are handled by [`build_request_body`]; rendering one here
/// is a caller error.
pub(crate) fn render_message(message: &Message) -> Result<Value, LlmError> {
    match message {
        Message::User { content, images, .. } => {
            let mut parts = Vec::new();
            for image in images {
                parts.push(render_image_part(image)?);
            }
            if let Some(text) = content {
                parts.push(json!({"text": text}));
            }
            Ok(json!({"parts": parts, "role": "user"}))
        }
        Message::Model { content, .. } => {
            Ok(json!({"parts": [{"text": content}], "role": "model"}))
        }
        Message::System { .. } => Err(LlmError::InvalidInput(
            "system messages are hoisted into systemInstruction, not rendered in contents".into(),
        )),
    }
}

fn render_image_part(image: &ImageSource) -> Result<Value, LlmError> {
    match image {
        ImageSource::Path(path) => {
            let encoded = encode_image(path)?;
            Ok(json!({
                "inline_data": {
                    "mime_type": encoded.media_type,
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
    _model: &str,
) -> Result<Value, LlmError> {
    let mut contents = Vec::new();
    let mut system_parts = Vec::new();
    for message in messages {
        if let Message::System { content, .. } = message {
            system_parts.push(json!({"text": content}));
        } else {
            contents.push(render_message(message)?);
        }
    }

    let mut body = serde_json::Map::new();
    body.insert("contents".into(), Value::Array(contents));
    if !system_parts.is_empty() {
        body.insert(
            "systemInstruction".into(),
            json!({"parts": system_parts}),
        );
    }

    // Tunables Gemini does not support (penalties, logit bias, logprobs)
    // are silently omitted.
    let mut config = serde_json::Map::new();
    if let Some(temperature) = params.temperature {
        config.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = params.top_p {
        config.insert("topP".into(), json!(top_p));
    }
    if let Some(max_tokens) = params.max_tokens {
        config.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if let Some(stop) = &params.stop_sequences {
        config.insert("stopSequences".into(), json!(stop));
    }
    if let Some(n) = params.n {
        config.insert("candidateCount".into(), json!(n));
    }
    if let Some(seed) = params.seed {
        config.insert("seed".into(), json!(seed));
    }
    if !config.is_empty() {
        body.insert("generationConfig".into(), Value::Object(config));
    }

    Ok(Value::Object(body))
}

pub(crate) fn parse_response(raw: Value) -> Result<CompletionResponse, LlmError> {
    let candidates = raw
        .get("candidates")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::ParseError("response has no candidates".into()))?;

    let texts: Vec<String> = candidates
        .iter()
        .map(|candidate| {
            candidate
                .pointer("/content/parts")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .concat()
                })
                .unwrap_or_default()
        })
        .collect();

    let finish_reason = candidates[0]
        .get("finishReason")
        .and_then(Value::as_str)
        .map(FinishReason::from_provider);

    let usage = raw.get("usageMetadata").map(|u| Usage {
        prompt_tokens: u
            .get("promptTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        completion_tokens: u
            .get("candidatesTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        total_tokens: u
            .get("totalTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
    });

    let metadata = ResponseMetadata {
        id: raw
            .get("responseId")
            .and_then(Value::as_str)
            .map(str::to_string),
        model: raw
            .get("modelVersion")
            .and_then(Value::as_str)
            .map(str::to_string),
        created: None,
        fingerprint: None,
    };

    Ok(CompletionResponse {
        texts,
        finish_reason,
        usage,
        metadata,
        raw,
    })
}
