//! API Module
//!
//! Unified chat request/response schemas and streaming messages.

pub mod chat;
pub mod stream;

pub use chat::{
    ChatMessage, ChatParams, ChatRequest, ChatResponse, OverrideChatRequest, ProviderResponse,
    TokenUsage,
};
pub use stream::{
    ChatStreamChunk, ChatStreamError, ChatStreamMessage, ChatStreamRequest, FinishReason,
    Metadata, ModelChunkResponse, StreamEvent,
};
