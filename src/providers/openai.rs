//! OpenAI Chat Completions adapter.
//!
//! Wire format: messages are `{"role": ..., "content": ...}` objects; a
//! multimodal user message carries a content array with the text block first
//! and `image_url` blocks (base64 data URLs) after it. The internal `model`
//! role maps to OpenAI's `assistant`.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::encoding::encode_image;
use crate::error::LlmError;
use crate::types::message::{ImageSource, Message};
use crate::types::params::GenerationParams;
use crate::types::response::{CompletionResponse, FinishReason, ResponseMetadata, Usage};

pub(crate) fn build_headers(api_key: &str) -> Result<HeaderMap, LlmError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| LlmError::InvalidInput("API key contains invalid header characters".into()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    Ok(headers)
}

/// Render one message into OpenAI's message object.
pub(crate) fn render_message(message: &Message) -> Result<Value, LlmError> {
    match message {
        Message::User { content, images, .. } => {
            let mut blocks = Vec::new();
            if let Some(text) = content {
                blocks.push(json!({"type": "text", "text": text}));
            }
            for image in images {
                blocks.push(render_image_block(image)?);
            }
            Ok(json!({"role": "user", "content": blocks}))
        }
        Message::Model { content, .. } => Ok(json!({"role": "assistant", "content": content})),
        Message::System { content, .. } => Ok(json!({"role": "system", "content": content})),
    }
}

fn render_image_block(image: &ImageSource) -> Result<Value, LlmError> {
    match image {
        ImageSource::Path(path) => {
            let encoded = encode_image(path)?;
            Ok(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", encoded.media_type, encoded.data)
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
    let rendered: Vec<Value> = messages
        .iter()
        .map(render_message)
        .collect::<Result<_, _>>()?;

    let mut body = serde_json::Map::new();
    body.insert("model".into(), json!(model));
    body.insert("messages".into(), Value::Array(rendered));

    if let Some(temperature) = params.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = params.top_p {
        body.insert("top_p".into(), json!(top_p));
    }
    if let Some(max_tokens) = params.max_tokens {
        body.insert("max_tokens".into(), json!(max_tokens));
    }
    if let Some(penalty) = params.frequency_penalty {
        body.insert("frequency_penalty".into(), json!(penalty));
    }
    if let Some(penalty) = params.presence_penalty {
        body.insert("presence_penalty".into(), json!(penalty));
    }
    if let Some(bias) = &params.logit_bias {
        body.insert("logit_bias".into(), json!(bias));
    }
    if let Some(logprobs) = params.logprobs {
        body.insert("logprobs".into(), json!(logprobs));
    }
    if let Some(top_logprobs) = params.top_logprobs {
        body.insert("top_logprobs".into(), json!(top_logprobs));
    }
    if let Some(n) = params.n {
        body.insert("n".into(), json!(n));
    }
    if let Some(seed) = params.seed {
        body.insert("seed".into(), json!(seed));
    }
    if let Some(stop) = &params.stop_sequences {
        body.insert("stop".into(), json!(stop));
    }

    Ok(Value::Object(body))
}

pub(crate) fn parse_response(raw: Value) -> Result<CompletionResponse, LlmError> {
    let choices = raw
        .get("choices")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::ParseError("response has no choices".into()))?;

    let texts: Vec<String> = choices
        .iter()
        .map(|choice| {
            choice
                .pointer("/message/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect();

    let finish_reason = choices[0]
        .get("finish_reason")
        .and_then(Value::as_str)
        .map(FinishReason::from_provider);

    let usage = raw.get("usage").map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
    });

    let metadata = ResponseMetadata {
        id: raw.get("id").and_then(Value::as_str).map(str::to_string),
        model: raw.get("model").and_then(Value::as_str).map(str::to_string),
        created: raw
            .get("created")
            .and_then(Value::as_i64)
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
        fingerprint: raw
            .get("system_fingerprint")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    Ok(CompletionResponse {
        texts,
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
    fn user_text_renders_as_single_text_block() {
        let msg = Message::user("hello");
        let rendered = render_message(&msg).unwrap();
        assert_eq!(
            rendered,
            json!({"role": "user", "content": [{"type": "text", "text": "hello"}]})
        );
    }

    #[test]
    fn role_mapping_uses_assistant_for_model() {
        let rendered = render_message(&Message::model("hi")).unwrap();
        assert_eq!(rendered["role"], "assistant");
        let rendered = render_message(&Message::system("be terse")).unwrap();
        assert_eq!(rendered["role"], "system");
    }

    #[test]
    fn images_render_after_the_text_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"png-bytes")
            .unwrap();

        let msg = Message::user_with_images("describe", vec![ImageSource::path(&path)]);
        let rendered = render_message(&msg).unwrap();
        let blocks = rendered["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[1]["type"], "image_url");
        let url = blocks[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn rendering_is_pure() {
        let msg = Message::user("same every time");
        assert_eq!(render_message(&msg).unwrap(), render_message(&msg).unwrap());
    }

    #[test]
    fn placeholder_image_fails_the_render() {
        let msg = Message::user_images(vec![ImageSource::Placeholder]);
        assert!(matches!(
            render_message(&msg),
            Err(LlmError::InvalidInput(_))
        ));
    }

    #[test]
    fn request_body_omits_unset_tunables() {
        let params = GenerationParams::builder()
            .temperature(0.7)
            .unwrap()
            .max_tokens(100)
            .build();
        let body = build_request_body(&[Message::user("hi")], &params, "gpt-4-turbo").unwrap();
        assert_eq!(body["model"], "gpt-4-turbo");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 100);
        assert!(body.get("top_p").is_none());
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn parse_extracts_all_choices_and_metadata() {
        let raw = json!({
            "id": "chatcmpl-1",
            "created": 1_700_000_000,
            "model": "gpt-4-turbo",
            "system_fingerprint": "fp_abc",
            "choices": [
                {"message": {"content": "first"}, "finish_reason": "stop"},
                {"message": {"content": "second"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        });
        let response = parse_response(raw).unwrap();
        assert_eq!(response.text(), "first");
        assert_eq!(response.texts, vec!["first", "second"]);
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.as_ref().unwrap().total_tokens, 12);
        assert_eq!(response.metadata.id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(response.metadata.fingerprint.as_deref(), Some("fp_abc"));
    }

    #[test]
    fn parse_rejects_missing_choices() {
        assert!(matches!(
            parse_response(json!({"id": "x", "choices": []})),
            Err(LlmError::ParseError(_))
        ));
    }
}
