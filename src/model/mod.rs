//! Model Wrapper
//!
//! Binds a provider client to the health and latency state the router needs to
//! pick between model instances.

use crate::api::{ChatParams, ChatResponse, ChatStreamChunk};
use crate::config::ModelConfig;
use crate::error::{ProviderError, Result};
use crate::provider::{ChatStream, LangProvider, ProviderRegistry};
use crate::resiliency::health::{ErrorBudget, HealthTracker};
use crate::router::latency::{LatencyConfig, MovingAverage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What routing strategies need to know about a model instance
pub trait Model: Send + Sync {
    /// Instance ID, unique within a router
    fn id(&self) -> &str;

    /// Whether the model may be picked right now
    fn healthy(&self) -> bool;

    /// Relative share of traffic under weighted round robin
    fn weight(&self) -> u32;

    /// How long a latency estimate stays trustworthy
    fn latency_update_interval(&self) -> Duration;
}

/// A configured language model instance
pub struct LanguageModel {
    id: String,
    weight: u32,
    provider: Arc<dyn LangProvider>,
    health: HealthTracker,
    chat_latency: MovingAverage,
    chat_stream_latency: MovingAverage,
    latency_update_interval: Duration,
    chunk_wait_threshold: Duration,
}

impl LanguageModel {
    pub fn new(
        id: impl Into<String>,
        provider: Arc<dyn LangProvider>,
        budget: ErrorBudget,
        latency: &LatencyConfig,
        weight: u32,
    ) -> Self {
        Self {
            id: id.into(),
            weight,
            provider,
            health: HealthTracker::new(budget),
            chat_latency: MovingAverage::from_config(latency),
            chat_stream_latency: MovingAverage::from_config(latency),
            latency_update_interval: latency.update_interval,
            chunk_wait_threshold: latency.chunk_wait_threshold,
        }
    }

    /// Build a model instance, resolving its provider through the registry
    pub fn from_config(config: &ModelConfig, registry: &ProviderRegistry) -> Result<Self> {
        let provider = registry.build(&config.provider)?;

        Ok(Self::new(
            config.id.clone(),
            provider,
            config.error_budget,
            &config.latency,
            config.weight,
        ))
    }

    pub fn provider(&self) -> &str {
        self.provider.provider()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn supports_chat_stream(&self) -> bool {
        self.provider.supports_chat_stream()
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Latency per response token of full chat calls (ms)
    pub fn chat_latency(&self) -> &MovingAverage {
        &self.chat_latency
    }

    /// Latency between stream chunks (ms)
    pub fn chat_stream_latency(&self) -> &MovingAverage {
        &self.chat_stream_latency
    }

    /// Send a chat request, keeping health and latency up to date
    pub async fn chat(
        &self,
        cancel: &CancellationToken,
        params: &ChatParams,
    ) -> std::result::Result<ChatResponse, ProviderError> {
        let started_at = Instant::now();

        match self.provider.chat(cancel, params).await {
            Ok(mut response) => {
                let tokens = response.model_response.token_usage.response_tokens.max(1);
                let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
                self.chat_latency.add(elapsed_ms / f64::from(tokens));

                response.model_id = self.id.clone();
                if response.provider.is_empty() {
                    response.provider = self.provider().to_string();
                }
                if response.model_name.is_empty() {
                    response.model_name = self.model_name().to_string();
                }

                Ok(response)
            }
            Err(err) => {
                self.health.track_error(&err);
                Err(err)
            }
        }
    }

    /// Open a chat stream. The returned handle records latency and errors as
    /// chunks are pulled from it.
    pub async fn chat_stream(
        &self,
        cancel: &CancellationToken,
        params: &ChatParams,
    ) -> std::result::Result<ModelStream<'_>, ProviderError> {
        let started_at = Instant::now();

        let mut stream = match self.provider.chat_stream(cancel, params).await {
            Ok(stream) => stream,
            Err(err) => {
                self.health.track_error(&err);
                return Err(err);
            }
        };

        if let Err(err) = stream.open().await {
            self.health.track_error(&err);
            if let Err(close_err) = stream.close().await {
                debug!(model_id = %self.id, error = %close_err, "Failed to close stream");
            }
            return Err(err);
        }

        self.chat_stream_latency.add_duration(started_at.elapsed());

        Ok(ModelStream {
            model: self,
            stream,
            closed: false,
        })
    }
}

impl Model for LanguageModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn healthy(&self) -> bool {
        self.health.is_healthy()
    }

    fn weight(&self) -> u32 {
        self.weight
    }

    fn latency_update_interval(&self) -> Duration {
        self.latency_update_interval
    }
}

impl std::fmt::Debug for LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModel")
            .field("id", &self.id)
            .field("provider", &self.provider())
            .field("model_name", &self.model_name())
            .field("weight", &self.weight)
            .field("health", &self.health)
            .finish()
    }
}

/// An open stream from a model instance
pub struct ModelStream<'a> {
    model: &'a LanguageModel,
    stream: Box<dyn ChatStream>,
    closed: bool,
}

impl ModelStream<'_> {
    /// Pull the next chunk.
    ///
    /// `None` means the stream is over. After an error the stream is closed
    /// and yields `None` from then on.
    pub async fn next(&mut self) -> Option<std::result::Result<ChatStreamChunk, ProviderError>> {
        if self.closed {
            return None;
        }

        // only time spent waiting on the provider counts, not on the consumer
        let started_at = Instant::now();

        match self.stream.recv().await {
            Ok(Some(mut chunk)) => {
                let waited = started_at.elapsed();
                // faster chunks were already buffered
                if waited > self.model.chunk_wait_threshold {
                    self.model.chat_stream_latency.add_duration(waited);
                }

                chunk.model_id = self.model.id.clone();
                if chunk.provider.is_empty() {
                    chunk.provider = self.model.provider().to_string();
                }
                if chunk.model_name.is_empty() {
                    chunk.model_name = self.model.model_name().to_string();
                }

                Some(Ok(chunk))
            }
            Ok(None) => {
                self.shutdown().await;
                None
            }
            Err(err) => {
                self.model.health.track_error(&err);
                self.shutdown().await;
                Some(Err(err))
            }
        }
    }

    /// Release the provider stream
    pub async fn close(mut self) {
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(err) = self.stream.close().await {
            debug!(model_id = %self.model.id, error = %err, "Failed to close stream");
        }
    }
}
