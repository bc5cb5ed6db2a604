//! Scripted provider for tests

use super::{ChatStream, LangProvider};
use crate::api::{
    ChatMessage, ChatParams, ChatResponse, ChatStreamChunk, ProviderResponse, TokenUsage,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A scripted chat response or stream chunk
#[derive(Debug, Clone)]
pub enum MockResponse {
    Msg(String),
    Err(ProviderError),
}

impl MockResponse {
    pub fn msg(content: &str) -> Self {
        MockResponse::Msg(content.to_string())
    }

    pub fn unavailable() -> Self {
        MockResponse::Err(ProviderError::Unavailable("mock provider is down".into()))
    }

    fn response(content: &str) -> ChatResponse {
        ChatResponse {
            id: "rsp0001".into(),
            created: 0,
            provider: "provider_mock".into(),
            model_response: ProviderResponse {
                metadata: HashMap::from([("ID".to_string(), "0001".to_string())]),
                message: ChatMessage::assistant(content),
                token_usage: TokenUsage {
                    prompt_tokens: 1,
                    response_tokens: 2,
                    total_tokens: 3,
                },
            },
            ..Default::default()
        }
    }
}

/// A scripted stream
#[derive(Debug, Clone)]
pub struct MockStream {
    open_err: Option<ProviderError>,
    chunks: VecDeque<MockResponse>,
    chunk_delay: Option<Duration>,
    closed: Arc<AtomicBool>,
}

impl MockStream {
    pub fn new(chunks: Vec<MockResponse>) -> Self {
        Self {
            open_err: None,
            chunks: chunks.into(),
            chunk_delay: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn of(contents: &[&str]) -> Self {
        Self::new(contents.iter().map(|c| MockResponse::msg(c)).collect())
    }

    pub fn failing_open(err: ProviderError) -> Self {
        Self {
            open_err: Some(err),
            ..Self::new(vec![])
        }
    }

    /// Sleep before every chunk
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Flag flipped once the stream is closed
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl ChatStream for MockStream {
    async fn open(&mut self) -> Result<(), ProviderError> {
        match self.open_err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn recv(&mut self) -> Result<Option<ChatStreamChunk>, ProviderError> {
        if let Some(delay) = self.chunk_delay {
            tokio::time::sleep(delay).await;
        }

        match self.chunks.pop_front() {
            None => Ok(None),
            Some(MockResponse::Msg(content)) => Ok(Some(ChatStreamChunk::with_content(content))),
            Some(MockResponse::Err(err)) => Err(err),
        }
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider returning scripted responses.
///
/// Chat responses cycle through the script; each `chat_stream` call takes the
/// next scripted stream.
#[derive(Debug, Default)]
pub struct MockProvider {
    model_name: String,
    chat_responses: Vec<MockResponse>,
    streams: Mutex<VecDeque<MockStream>>,
    supports_streaming: bool,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            model_name: "model_mock".into(),
            chat_responses: responses,
            ..Default::default()
        }
    }

    pub fn with_streams(streams: Vec<MockStream>) -> Self {
        Self {
            model_name: "model_mock".into(),
            streams: Mutex::new(streams.into()),
            supports_streaming: true,
            ..Default::default()
        }
    }

    /// Always answers with `content`
    pub fn ok(content: &str) -> Self {
        Self::with_responses(vec![MockResponse::msg(content)])
    }

    /// Always fails
    pub fn failing() -> Self {
        Self::with_responses(vec![MockResponse::unavailable()])
    }

    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model_name = name.to_string();
        self
    }

    /// Number of chat and chat_stream calls served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LangProvider for MockProvider {
    fn provider(&self) -> &str {
        "provider_mock"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn supports_chat_stream(&self) -> bool {
        self.supports_streaming
    }

    async fn chat(
        &self,
        _cancel: &CancellationToken,
        _params: &ChatParams,
    ) -> Result<ChatResponse, ProviderError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);

        if self.chat_responses.is_empty() {
            return Err(ProviderError::Unavailable("no scripted responses".into()));
        }

        match &self.chat_responses[idx % self.chat_responses.len()] {
            MockResponse::Msg(content) => Ok(MockResponse::response(content)),
            MockResponse::Err(err) => Err(err.clone()),
        }
    }

    async fn chat_stream(
        &self,
        _cancel: &CancellationToken,
        _params: &ChatParams,
    ) -> Result<Box<dyn ChatStream>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.streams.lock().pop_front() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(ProviderError::Unavailable("no scripted streams".into())),
        }
    }
}
