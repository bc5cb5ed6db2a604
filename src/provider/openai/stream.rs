//! Server-Sent Events stream of chat completion chunks

use super::schemas::{finish_reason, ChatCompletionChunk, ChatCompletionRequest};
use super::PROVIDER_ID;
use crate::api::{ChatMessage, ChatStreamChunk, ModelChunkResponse};
use crate::client::HttpClient;
use crate::error::ProviderError;
use crate::provider::ChatStream;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// A parsed SSE line
#[derive(Debug)]
pub enum SseEvent {
    Chunk(ChatCompletionChunk),
    /// The `[DONE]` sentinel
    Done,
    /// Blank lines, comments and non-data fields
    Skip,
}

/// Parse SSE data line into a chunk
pub fn parse_sse_line(line: &str) -> Result<SseEvent, ProviderError> {
    // Skip empty lines and comments
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(SseEvent::Skip);
    }

    // Parse data: prefix
    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim();

        if data == "[DONE]" {
            return Ok(SseEvent::Done);
        }

        let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(|e| {
            ProviderError::Stream(format!("Failed to parse SSE chunk: {}. Data: {}", e, data))
        })?;

        return Ok(SseEvent::Chunk(chunk));
    }

    // Ignore other event types (event:, id:, retry:)
    Ok(SseEvent::Skip)
}

/// Streaming chat completion
pub struct OpenAiChatStream {
    client: HttpClient,
    url: String,
    headers: HeaderMap,
    request: ChatCompletionRequest,
    cancel: CancellationToken,
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    buffer: BytesMut,
    done: bool,
}

impl OpenAiChatStream {
    pub(super) fn new(
        client: HttpClient,
        url: String,
        headers: HeaderMap,
        request: ChatCompletionRequest,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            url,
            headers,
            request,
            cancel,
            body: None,
            buffer: BytesMut::new(),
            done: false,
        }
    }

    /// Take the next complete line out of the buffer
    fn next_line(&mut self) -> Option<BytesMut> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        Some(self.buffer.split_to(pos + 1))
    }

    /// Turn a wire chunk into a gateway chunk, skipping ones with nothing to say
    fn convert(chunk: ChatCompletionChunk) -> Option<ChatStreamChunk> {
        let choice = chunk.choices.into_iter().next()?;
        let content = choice.delta.content.unwrap_or_default();

        if content.is_empty() && choice.finish_reason.is_none() {
            return None;
        }

        Some(ChatStreamChunk {
            model_id: String::new(),
            provider: PROVIDER_ID.to_string(),
            model_name: chunk.model,
            model_response: ModelChunkResponse {
                metadata: HashMap::from([("response_id".to_string(), chunk.id)]),
                message: ChatMessage::new(
                    choice.delta.role.unwrap_or_else(|| "assistant".to_string()),
                    content,
                ),
            },
            finish_reason: choice.finish_reason.as_deref().map(finish_reason),
        })
    }
}

#[async_trait]
impl ChatStream for OpenAiChatStream {
    async fn open(&mut self) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(
                &self.cancel,
                &self.url,
                self.headers.clone(),
                &self.request,
                PROVIDER_ID,
            )
            .await?;

        self.body = Some(response.bytes_stream().boxed());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<ChatStreamChunk>, ProviderError> {
        loop {
            if self.done {
                return Ok(None);
            }

            if let Some(line) = self.next_line() {
                let line = std::str::from_utf8(&line)
                    .map_err(|e| ProviderError::Stream(format!("Invalid UTF-8 in stream: {}", e)))?;

                match parse_sse_line(line)? {
                    SseEvent::Done => {
                        self.done = true;
                        return Ok(None);
                    }
                    SseEvent::Chunk(chunk) => {
                        if let Some(chunk) = Self::convert(chunk) {
                            return Ok(Some(chunk));
                        }
                    }
                    SseEvent::Skip => {}
                }
                continue;
            }

            let Some(body) = self.body.as_mut() else {
                return Err(ProviderError::Stream("stream is not open".into()));
            };

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ProviderError::Cancelled),
                next = body.next() => next,
            };

            match next {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(e.into()),
                None if self.buffer.is_empty() => {
                    self.done = true;
                    return Ok(None);
                }
                // flush a last line that came without a trailing newline
                None => {
                    self.body = None;
                    self.buffer.extend_from_slice(b"\n");
                    let line = self.buffer.split();
                    self.done = true;
                    let line = std::str::from_utf8(&line).map_err(|e| {
                        ProviderError::Stream(format!("Invalid UTF-8 in stream: {}", e))
                    })?;

                    if let SseEvent::Chunk(chunk) = parse_sse_line(line)? {
                        return Ok(Self::convert(chunk));
                    }
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        self.body = None;
        self.done = true;
        Ok(())
    }
}
