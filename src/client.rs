//! Completion client.
//!
//! One client binds a provider, a model, credentials and a fixed set of
//! generation parameters to a shared HTTP connection pool. `complete` is a
//! single logical attempt; `complete_resilient` layers admission control and
//! the retry executor on top and is what the batch runner uses.

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::error::{LlmError, classify_http_error};
use crate::limit::ConcurrencyLimiter;
use crate::providers::ProviderKind;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::types::message::Message;
use crate::types::params::GenerationParams;
use crate::types::response::CompletionResponse;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_CONCURRENCY: usize = 5;
const PREVIEW_CHARS: usize = 200;

/// Client configuration.
///
/// The API key lives in a [`SecretString`]; it is exposed only while
/// building request headers and never appears in `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: ProviderKind,
    pub api_key: SecretString,
    pub model: String,
    /// Override of the provider's default API base URL
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Admission cap for `complete_resilient`
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Configuration with explicit credentials.
    pub fn new(provider: ProviderKind, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: SecretString::from(api_key.into()),
            model: model.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }

    /// Read the provider's conventional API key variable
    /// (`OPENAI_API_KEY`, `GEMINI_API_KEY`, `ANTHROPIC_API_KEY`).
    ///
    /// The only place the crate touches the environment.
    pub fn from_env(provider: ProviderKind, model: impl Into<String>) -> Result<Self, LlmError> {
        let var = match provider {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        };
        let key = std::env::var(var)
            .map_err(|_| LlmError::AuthenticationError(format!("{var} is not set")))?;
        Ok(Self::new(provider, key, model))
    }

    /// Override the API base URL (used for proxies and tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the admission cap.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// A provider-bound completion client.
pub struct CompletionClient {
    config: ClientConfig,
    params: GenerationParams,
    http: reqwest::Client,
    limiter: ConcurrencyLimiter,
}

impl CompletionClient {
    /// Build a client with a shared connection pool and admission limiter.
    pub fn new(config: ClientConfig, params: GenerationParams) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::HttpError(format!("failed to build HTTP client: {e}")))?;
        let limiter = ConcurrencyLimiter::new(config.max_concurrency);
        Ok(Self {
            config,
            params,
            http,
            limiter,
        })
    }

    /// Provider this client talks to.
    pub fn provider(&self) -> ProviderKind {
        self.config.provider
    }

    /// Generation parameters bound at construction.
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.config.provider.default_base_url());
        self.config.provider.endpoint(base, &self.config.model)
    }

    /// Execute one logical completion call.
    ///
    /// Renders the conversation, performs exactly one HTTP round trip and
    /// normalizes the response. Failures come back as typed errors; a failed
    /// call is never reported as an empty success.
    pub async fn complete(&self, messages: &[Message]) -> Result<CompletionResponse, LlmError> {
        let provider = self.config.provider;
        // Rendering may read image files from disk, so it runs off the
        // async workers.
        let body = {
            let messages = messages.to_vec();
            let params = self.params.clone();
            let model = self.config.model.clone();
            tokio::task::spawn_blocking(move || {
                provider.build_request_body(&messages, &params, &model)
            })
            .await
            .map_err(|e| LlmError::InternalError(format!("request build task failed: {e}")))??
        };
        let headers = provider.build_headers(self.config.api_key.expose_secret())?;
        let url = self.endpoint();

        if let Some(last) = messages.last() {
            debug!(
                provider = %provider,
                model = %self.config.model,
                messages = messages.len(),
                preview = %last.preview(PREVIEW_CHARS),
                "sending completion request"
            );
        }

        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let text = response.text().await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let error =
                classify_http_error(&provider.to_string(), status.as_u16(), &text, &response_headers);
            warn!(
                provider = %provider,
                model = %self.config.model,
                status = status.as_u16(),
                duration_ms,
                error = %error,
                "completion request failed"
            );
            return Err(error);
        }

        let raw: serde_json::Value = serde_json::from_str(&text)?;
        let completion = provider.parse_response(raw)?;

        let response_preview: String = completion.text().chars().take(PREVIEW_CHARS).collect();
        info!(
            provider = %provider,
            model = %self.config.model,
            duration_ms,
            response_id = completion.metadata.id.as_deref().unwrap_or("-"),
            total_tokens = completion
                .usage
                .as_ref()
                .map(|u| u.total_tokens)
                .unwrap_or(0),
            response_preview = %response_preview,
            "completion request succeeded"
        );
        Ok(completion)
    }

    /// Execute a completion under admission control and the retry policy.
    ///
    /// Suspends while the limiter is at capacity, then retries transient
    /// failures per the configured [`RetryPolicy`]. An exhausted budget
    /// surfaces as [`LlmError::RetriesExhausted`].
    pub async fn complete_resilient(
        &self,
        messages: &[Message],
    ) -> Result<CompletionResponse, LlmError> {
        let _permit = self.limiter.acquire().await;
        let executor = RetryExecutor::new(self.config.retry.clone());
        executor.execute(|| self.complete(messages)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config(provider: ProviderKind, base_url: &str) -> ClientConfig {
        ClientConfig::new(provider, "test-key", "test-model")
            .with_base_url(base_url)
            .with_retry(
                RetryPolicy::new()
                    .with_max_attempts(2)
                    .with_initial_delay(Duration::from_millis(1))
                    .with_jitter(false),
            )
    }

    #[test]
    fn debug_output_redacts_the_api_key() {
        let config = ClientConfig::new(ProviderKind::OpenAi, "sk-secret-value", "gpt-4-turbo");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret-value"));
    }

    #[tokio::test]
    async fn complete_round_trips_against_a_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                json!({
                    "id": "chatcmpl-1",
                    "model": "test-model",
                    "choices": [{"message": {"content": "pong"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = CompletionClient::new(
            test_config(ProviderKind::OpenAi, &server.url()),
            GenerationParams::default(),
        )
        .unwrap();
        let response = client.complete(&[Message::user("ping")]).await.unwrap();

        assert_eq!(response.text(), "pong");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn complete_renders_image_messages() {
        use crate::types::message::ImageSource;
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::Regex("image_url".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "id": "chatcmpl-3",
                    "choices": [{"message": {"content": "a chart"}, "finish_reason": "stop"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"png-bytes")
            .unwrap();

        let client = CompletionClient::new(
            test_config(ProviderKind::OpenAi, &server.url()),
            GenerationParams::default(),
        )
        .unwrap();
        let msg = Message::user_with_images("describe", vec![ImageSource::path(&path)]);
        let response = client.complete(&[msg]).await.unwrap();

        assert_eq!(response.text(), "a chart");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_401_maps_to_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "invalid api key"}}"#)
            .create_async()
            .await;

        let client = CompletionClient::new(
            test_config(ProviderKind::OpenAi, &server.url()),
            GenerationParams::default(),
        )
        .unwrap();
        let error = client.complete(&[Message::user("ping")]).await.unwrap_err();

        assert!(matches!(error, LlmError::AuthenticationError(_)));
    }

    #[tokio::test]
    async fn resilient_call_reports_exhaustion() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("still broken")
            .expect(2)
            .create_async()
            .await;

        let client = CompletionClient::new(
            test_config(ProviderKind::OpenAi, &server.url()),
            GenerationParams::default(),
        )
        .unwrap();
        let error = client
            .complete_resilient(&[Message::user("ping")])
            .await
            .unwrap_err();

        match error {
            LlmError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, LlmError::ApiError { code: 500, .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("unauthorized")
            .expect(1)
            .create_async()
            .await;

        let client = CompletionClient::new(
            test_config(ProviderKind::OpenAi, &server.url()),
            GenerationParams::default(),
        )
        .unwrap();
        let error = client
            .complete_resilient(&[Message::user("ping")])
            .await
            .unwrap_err();

        assert!(matches!(error, LlmError::AuthenticationError(_)));
        mock.assert_async().await;
    }
}
