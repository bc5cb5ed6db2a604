//! OpenAI Provider
//!
//! Client for the OpenAI Chat Completions API and any server speaking the
//! same protocol (set `base_url`).

pub mod schemas;
pub mod stream;

use crate::api::{ChatMessage, ChatParams, ChatResponse, ProviderResponse, TokenUsage};
use crate::client::HttpClient;
use crate::config::duration;
use crate::config::ProviderConfig;
use crate::error::{GatewayError, ProviderError, Result};
use crate::provider::{ChatStream, LangProvider};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use schemas::{ChatCompletion, ChatCompletionRequest, DefaultParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stream::OpenAiChatStream;
use tokio_util::sync::CancellationToken;

/// Registry name of this provider
pub const PROVIDER_ID: &str = "openai";

/// OpenAI client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Base URL for the API
    pub base_url: String,

    /// Model name sent with every request
    pub model: String,

    /// API key given inline. Takes precedence over `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    pub api_key_env: String,

    /// Additional headers to send with requests
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Whole-request timeout
    #[serde(with = "duration::serde_str")]
    pub timeout: Duration,

    /// Sampling parameters for every request
    pub default_params: DefaultParams,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(120),
            default_params: DefaultParams::default(),
        }
    }
}

impl OpenAiConfig {
    /// Resolve the API key from config or environment
    fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }

        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GatewayError::Config(format!(
                    "No API key for provider '{}'. Set 'api_key' or the {} environment variable",
                    PROVIDER_ID, self.api_key_env
                ))
            })
    }

    fn extra_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GatewayError::Config(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GatewayError::Config(format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

/// OpenAI chat client
#[derive(Debug)]
pub struct OpenAiProvider {
    client: HttpClient,
    config: OpenAiConfig,
    headers: HeaderMap,
    chat_url: String,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let headers = HttpClient::json_headers(&api_key, &config.extra_headers()?)?;
        let client = HttpClient::new(config.timeout)?;
        let chat_url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            headers,
            chat_url,
        })
    }

    /// Factory used by the provider registry
    pub fn from_provider_config(config: &ProviderConfig) -> Result<Arc<dyn LangProvider>> {
        let config: OpenAiConfig = config.parse_params()?;
        Ok(Arc::new(Self::new(config)?))
    }

    fn request(&self, params: &ChatParams) -> ChatCompletionRequest {
        ChatCompletionRequest::new(
            &self.config.model,
            params.messages.clone(),
            &self.config.default_params,
        )
    }

    fn into_response(completion: ChatCompletion) -> std::result::Result<ChatResponse, ProviderError> {
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Response("Response contains no choices".into()))?;

        let usage = completion.usage.unwrap_or_default();

        let mut metadata = HashMap::new();
        if let Some(fingerprint) = completion.system_fingerprint {
            metadata.insert("system_fingerprint".to_string(), fingerprint);
        }

        Ok(ChatResponse {
            id: completion.id,
            created: completion.created,
            provider: PROVIDER_ID.to_string(),
            model_name: completion.model,
            model_response: ProviderResponse {
                metadata,
                message: ChatMessage::new(
                    choice.message.role,
                    choice.message.content.unwrap_or_default(),
                ),
                token_usage: TokenUsage {
                    prompt_tokens: usage.prompt_tokens,
                    response_tokens: usage.completion_tokens,
                    total_tokens: usage.total_tokens,
                },
            },
            ..Default::default()
        })
    }
}

#[async_trait]
impl LangProvider for OpenAiProvider {
    fn provider(&self) -> &str {
        PROVIDER_ID
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_chat_stream(&self) -> bool {
        true
    }

    async fn chat(
        &self,
        cancel: &CancellationToken,
        params: &ChatParams,
    ) -> std::result::Result<ChatResponse, ProviderError> {
        let completion: ChatCompletion = self
            .client
            .post_json(
                cancel,
                &self.chat_url,
                self.headers.clone(),
                &self.request(params),
                PROVIDER_ID,
            )
            .await?;

        Self::into_response(completion)
    }

    async fn chat_stream(
        &self,
        cancel: &CancellationToken,
        params: &ChatParams,
    ) -> std::result::Result<Box<dyn ChatStream>, ProviderError> {
        Ok(Box::new(OpenAiChatStream::new(
            self.client.clone(),
            self.chat_url.clone(),
            self.headers.clone(),
            self.request(params).with_stream(true),
            cancel.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FinishReason;

    fn provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig {
            base_url: base_url.to_string(),
            model: "gpt-4o".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    fn params() -> ChatParams {
        ChatParams {
            messages: vec![ChatMessage::user("Hello")],
        }
    }

    #[test]
    fn test_config_from_provider_params() {
        let config = ProviderConfig::new("openai")
            .with_param("model", "gpt-4o")
            .with_param("api_key", "sk-test")
            .with_param("timeout", "30s");

        let provider = OpenAiProvider::from_provider_config(&config).unwrap();
        assert_eq!(provider.provider(), "openai");
        assert_eq!(provider.model_name(), "gpt-4o");
        assert!(provider.supports_chat_stream());
    }

    #[test]
    fn test_missing_api_key() {
        let config = OpenAiConfig {
            api_key_env: "LLM_GATEWAY_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(matches!(OpenAiProvider::new(config), Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_chat() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "chatcmpl-1",
                    "created": 1700000000,
                    "model": "gpt-4o-2024-08-06",
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
                }"#,
            )
            .create_async()
            .await;

        let response = provider(&server.url())
            .chat(&CancellationToken::new(), &params())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.content(), "Hi there");
        assert_eq!(response.provider, "openai");
        assert_eq!(response.model_name, "gpt-4o-2024-08-06");
        assert_eq!(response.model_response.token_usage.response_tokens, 2);
    }

    #[tokio::test]
    async fn test_chat_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "12")
            .with_body(r#"{"error": {"message": "Rate limit reached"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .chat(&CancellationToken::new(), &params())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(12)
        ));
    }

    #[tokio::test]
    async fn test_chat_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = provider(&server.url())
            .chat(&CancellationToken::new(), &params())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_chat_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "Incorrect API key"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .chat(&CancellationToken::new(), &params())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn test_chat_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        // nothing listens here; cancellation must win before any I/O result
        let err = provider("http://127.0.0.1:9")
            .chat(&cancel, &params())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn test_chat_stream() {
        let mut server = mockito::Server::new_async().await;
        let body = [
            r#"data: {"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
            "",
            r#"data: {"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#,
            "",
            r#"data: {"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
            "",
            "data: [DONE]",
            "",
        ]
        .join("\n");

        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"stream": true}"#.into()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let provider = provider(&server.url());
        let mut stream = provider
            .chat_stream(&CancellationToken::new(), &params())
            .await
            .unwrap();

        stream.open().await.unwrap();

        let first = stream.recv().await.unwrap().unwrap();
        assert_eq!(first.content(), "Hel");
        assert_eq!(first.finish_reason, None);

        let second = stream.recv().await.unwrap().unwrap();
        assert_eq!(second.content(), "lo");
        assert_eq!(second.finish_reason, Some(FinishReason::Complete));

        assert!(stream.recv().await.unwrap().is_none());
        stream.close().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_stream_open_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let provider = provider(&server.url());
        let mut stream = provider
            .chat_stream(&CancellationToken::new(), &params())
            .await
            .unwrap();

        assert!(matches!(stream.open().await, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_recv_before_open() {
        let provider = provider("http://127.0.0.1:9");
        let mut stream = provider
            .chat_stream(&CancellationToken::new(), &params())
            .await
            .unwrap();

        assert!(matches!(stream.recv().await, Err(ProviderError::Stream(_))));
    }
}
