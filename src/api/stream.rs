//! Streaming Chat API
//!
//! Messages pushed to the caller's channel during a streaming chat.

use crate::api::chat::{ChatMessage, ChatParams, OverrideChatRequest};
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arbitrary caller metadata echoed back on every stream message
pub type Metadata = HashMap<String, serde_json::Value>;

/// Why a model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the response
    Complete,
    /// Hit the token limit
    MaxTokens,
    /// Output blocked by a content filter
    ContentFiltered,
    /// The stream ended because of an error
    Error,
    /// Anything the provider reports that we do not recognize
    Other,
}

/// Streaming chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamRequest {
    /// Request ID, echoed on every message
    #[serde(default = "new_request_id")]
    pub id: String,

    pub message: ChatMessage,

    #[serde(default, rename = "messageHistory")]
    pub message_history: Vec<ChatMessage>,

    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_params: Option<OverrideChatRequest>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ChatStreamRequest {
    /// Create a request from a single message with a fresh request ID
    pub fn new(message: ChatMessage) -> Self {
        Self {
            id: new_request_id(),
            message,
            message_history: Vec::new(),
            override_params: None,
            metadata: Metadata::new(),
        }
    }

    /// Create a request from a plain user string
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(ChatMessage::user(content))
    }

    /// Attach caller metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Build provider params for the given model instance
    pub fn params(&self, model_id: &str) -> ChatParams {
        ChatParams::build(
            &self.message,
            &self.message_history,
            self.override_params.as_ref(),
            model_id,
        )
    }
}

/// Incremental model output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelChunkResponse {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    pub message: ChatMessage,
}

/// One chunk of a streaming response as produced by a provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model_id: String,

    #[serde(default, rename = "providerName", skip_serializing_if = "String::is_empty")]
    pub provider: String,

    #[serde(default, rename = "modelName", skip_serializing_if = "String::is_empty")]
    pub model_name: String,

    #[serde(rename = "modelResponse")]
    pub model_response: ModelChunkResponse,

    #[serde(default, rename = "finishReason", skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChatStreamChunk {
    /// Create a chunk carrying the given content delta
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            model_response: ModelChunkResponse {
                metadata: HashMap::new(),
                message: ChatMessage::assistant(content),
            },
            ..Default::default()
        }
    }

    /// The content delta
    pub fn content(&self) -> &str {
        &self.model_response.message.content
    }
}

/// An error reported on the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamError {
    #[serde(rename = "name")]
    pub error_kind: ErrorKind,

    pub message: String,

    #[serde(default, rename = "finishReason", skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Payload of a stream message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk(ChatStreamChunk),
    Error(ChatStreamError),
}

/// A message delivered on the caller's stream channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamMessage {
    /// Request ID
    pub id: String,

    #[serde(rename = "createdAt")]
    pub created_at: i64,

    #[serde(rename = "routerId")]
    pub router_id: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,

    #[serde(flatten)]
    pub event: StreamEvent,
}

impl ChatStreamMessage {
    /// Wrap a model chunk
    pub fn chunk(
        request_id: &str,
        router_id: &str,
        metadata: &Metadata,
        chunk: ChatStreamChunk,
    ) -> Self {
        Self {
            id: request_id.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            router_id: router_id.to_string(),
            metadata: metadata.clone(),
            event: StreamEvent::Chunk(chunk),
        }
    }

    /// Build an error message
    pub fn error(
        request_id: &str,
        router_id: &str,
        error_kind: ErrorKind,
        message: impl Into<String>,
        metadata: &Metadata,
        finish_reason: Option<FinishReason>,
    ) -> Self {
        Self {
            id: request_id.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            router_id: router_id.to_string(),
            metadata: metadata.clone(),
            event: StreamEvent::Error(ChatStreamError {
                error_kind,
                message: message.into(),
                finish_reason,
            }),
        }
    }

    /// The chunk, if this message carries one
    pub fn as_chunk(&self) -> Option<&ChatStreamChunk> {
        match &self.event {
            StreamEvent::Chunk(chunk) => Some(chunk),
            StreamEvent::Error(_) => None,
        }
    }

    /// The error, if this message carries one
    pub fn as_error(&self) -> Option<&ChatStreamError> {
        match &self.event {
            StreamEvent::Error(err) => Some(err),
            StreamEvent::Chunk(_) => None,
        }
    }
}
