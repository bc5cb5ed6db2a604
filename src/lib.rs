//! LLM Gateway
//!
//! A model-agnostic chat gateway core. Routers pick a model instance for each
//! request from a configured pool, track per-model health and latency, fall
//! back to other models on failure and retry the whole pool with exponential
//! backoff.
//!
//! ```no_run
//! use llm_gateway::{ChatRequest, ConfigLoader, ProviderRegistry, RouterManager};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> llm_gateway::Result<()> {
//! let config = ConfigLoader::new()?.into_config();
//! let manager = RouterManager::from_config(&config, &ProviderRegistry::with_builtins())?;
//!
//! let router = manager.get_router("default")?;
//! let response = router
//!     .chat(&CancellationToken::new(), &ChatRequest::from_text("Hello!"))
//!     .await?;
//! println!("{}", response.content());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod resiliency;
pub mod router;
pub mod telemetry;

pub use api::{
    ChatMessage, ChatParams, ChatRequest, ChatResponse, ChatStreamChunk, ChatStreamMessage,
    ChatStreamRequest, FinishReason,
};
pub use config::{ConfigLoader, GatewayConfig, LangRouterConfig, ModelConfig, ProviderConfig};
pub use error::{ErrorKind, GatewayError, ProviderError, Result};
pub use model::{LanguageModel, Model};
pub use provider::{ChatStream, LangProvider, ProviderRegistry};
pub use router::{LangRouter, RouterManager, RoutingStrategy};
