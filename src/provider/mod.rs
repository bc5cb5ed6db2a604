//! Provider Module
//!
//! The capability interface every vendor client implements, and the registry
//! that turns provider config into clients.

pub mod openai;
#[cfg(test)]
pub mod testing;

use crate::api::{ChatParams, ChatResponse, ChatStreamChunk};
use crate::config::ProviderConfig;
use crate::error::{GatewayError, ProviderError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A streaming chat response being read from a provider
#[async_trait]
pub trait ChatStream: Send {
    /// Establish the stream (e.g. send the HTTP request)
    async fn open(&mut self) -> std::result::Result<(), ProviderError>;

    /// Read the next chunk. `Ok(None)` marks the end of the stream.
    async fn recv(&mut self) -> std::result::Result<Option<ChatStreamChunk>, ProviderError>;

    /// Release the underlying connection
    async fn close(&mut self) -> std::result::Result<(), ProviderError>;
}

/// What a provider client must offer to serve language chat requests
#[async_trait]
pub trait LangProvider: Send + Sync {
    /// Provider ID (e.g. "openai")
    fn provider(&self) -> &str;

    /// Provider-side model name
    fn model_name(&self) -> &str;

    /// Whether `chat_stream` is implemented
    fn supports_chat_stream(&self) -> bool;

    async fn chat(
        &self,
        cancel: &CancellationToken,
        params: &ChatParams,
    ) -> std::result::Result<ChatResponse, ProviderError>;

    /// Prepare a stream. The returned handle is not yet open.
    async fn chat_stream(
        &self,
        cancel: &CancellationToken,
        params: &ChatParams,
    ) -> std::result::Result<Box<dyn ChatStream>, ProviderError>;
}

/// Builds a provider client from its config
pub type ProviderFactory =
    Box<dyn Fn(&ProviderConfig) -> Result<Arc<dyn LangProvider>> + Send + Sync>;

/// Provider types known to the gateway, keyed by the config `type` field
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all providers shipped in this crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            openai::PROVIDER_ID.to_string(),
            Box::new(openai::OpenAiProvider::from_provider_config),
        );
        registry
    }

    /// Register a provider type. Names must be unique.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn LangProvider>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(GatewayError::Config(format!(
                "provider '{}' is already registered",
                name
            )));
        }

        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Check if a provider type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// List registered provider types
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a client for the given config
    pub fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn LangProvider>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| GatewayError::ProviderNotFound(config.kind.clone()))?;

        factory(config)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available())
            .finish()
    }
}
