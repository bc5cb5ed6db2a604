//! Unified Chat API
//!
//! Request and response shapes shared by every router and provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message in a chat conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user" or "assistant"
    pub role: String,

    /// Message content
    pub content: String,

    /// Optional name for the message author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Create a message with the given role and content
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Replaces the request message when a specific model gets picked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideChatRequest {
    /// Model instance ID the override applies to
    #[serde(rename = "model_id")]
    pub model_id: String,

    /// Message to send instead of the default one
    pub message: ChatMessage,
}

/// Chat request unified across all language models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The latest message
    pub message: ChatMessage,

    /// Previous messages in the conversation
    #[serde(default, rename = "messageHistory")]
    pub message_history: Vec<ChatMessage>,

    /// Optional per-model message override
    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_params: Option<OverrideChatRequest>,
}

impl ChatRequest {
    /// Create a request from a single user message
    pub fn new(message: ChatMessage) -> Self {
        Self {
            message,
            message_history: Vec::new(),
            override_params: None,
        }
    }

    /// Create a request from a plain user string
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(ChatMessage::user(content))
    }

    /// Set the conversation history
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.message_history = history;
        self
    }

    /// Override the message for one specific model
    pub fn with_override(mut self, model_id: impl Into<String>, message: ChatMessage) -> Self {
        self.override_params = Some(OverrideChatRequest {
            model_id: model_id.into(),
            message,
        });
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

/// What a provider actually receives: the flattened conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatParams {
    pub messages: Vec<ChatMessage>,
}

impl ChatParams {
    pub(crate) fn build(
        message: &ChatMessage,
        history: &[ChatMessage],
        override_params: Option<&OverrideChatRequest>,
        model_id: &str,
    ) -> Self {
        let latest = match override_params {
            Some(o) if o.model_id == model_id => &o.message,
            _ => message,
        };

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.extend_from_slice(history);
        messages.push(latest.clone());

        Self { messages }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(rename = "promptTokens")]
    pub prompt_tokens: u32,

    #[serde(rename = "responseTokens")]
    pub response_tokens: u32,

    #[serde(rename = "totalTokens")]
    pub total_tokens: u32,
}

/// The unified response from the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Provider-specific metadata (e.g. system fingerprint)
    #[serde(default, rename = "responseId", skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    pub message: ChatMessage,

    #[serde(rename = "tokenCount")]
    pub token_usage: TokenUsage,
}

/// Chat response unified across all language models
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Creation timestamp (unix seconds)
    #[serde(default)]
    pub created: i64,

    /// Provider that served the request
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,

    /// Router that served the request
    #[serde(default, rename = "router", skip_serializing_if = "String::is_empty")]
    pub router_id: String,

    /// Model instance that served the request
    #[serde(default, rename = "model_id", skip_serializing_if = "String::is_empty")]
    pub model_id: String,

    /// Provider-side model name
    #[serde(default, rename = "model", skip_serializing_if = "String::is_empty")]
    pub model_name: String,

    #[serde(default)]
    pub cached: bool,

    #[serde(rename = "modelResponse")]
    pub model_response: ProviderResponse,
}

impl ChatResponse {
    /// Get the response text
    pub fn content(&self) -> &str {
        &self.model_response.message.content
    }
}
