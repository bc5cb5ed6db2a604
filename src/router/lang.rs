//! Language Router
//!
//! Serves chat requests from a pool of model instances. A request walks the
//! pool with the configured strategy, falling back to the next model on
//! errors, and rescans the whole pool with exponential backoff when no
//! healthy model is left.

use crate::api::{ChatRequest, ChatResponse, ChatStreamMessage, ChatStreamRequest, FinishReason};
use crate::config::LangRouterConfig;
use crate::error::{ErrorKind, GatewayError, ProviderError, Result};
use crate::model::{LanguageModel, Model};
use crate::provider::ProviderRegistry;
use crate::resiliency::retry::ExpRetry;
use crate::router::routing::{LangModelRouting, RoutingStrategy};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A router over a pool of language models
pub struct LangRouter {
    id: String,
    strategy: RoutingStrategy,
    models: Vec<Arc<LanguageModel>>,
    stream_models: Vec<Arc<LanguageModel>>,
    chat_routing: Box<dyn LangModelRouting<LanguageModel>>,
    chat_stream_routing: Box<dyn LangModelRouting<LanguageModel>>,
    retry: ExpRetry,
}

impl LangRouter {
    /// Create a router over already built models.
    ///
    /// The pool must be non-empty and model IDs unique. Models whose provider
    /// supports streaming also form the streaming pool.
    pub fn new(
        id: impl Into<String>,
        strategy: RoutingStrategy,
        models: Vec<Arc<LanguageModel>>,
        retry: ExpRetry,
    ) -> Result<Self> {
        let id = id.into();

        if models.is_empty() {
            return Err(GatewayError::Config(format!(
                "router '{}' must have at least one active model, zero defined",
                id
            )));
        }

        let mut seen = HashSet::new();
        for model in &models {
            if !seen.insert(model.id()) {
                return Err(GatewayError::Config(format!(
                    "ID '{}' is specified for more than one model in router '{}', while it should be unique",
                    model.id(),
                    id
                )));
            }
        }

        let stream_models: Vec<_> = models
            .iter()
            .filter(|m| m.supports_chat_stream())
            .cloned()
            .collect();

        let chat_routing = strategy.build(models.clone(), LanguageModel::chat_latency);
        let chat_stream_routing =
            strategy.build(stream_models.clone(), LanguageModel::chat_stream_latency);

        Ok(Self {
            id,
            strategy,
            models,
            stream_models,
            chat_routing,
            chat_stream_routing,
            retry,
        })
    }

    /// Build a router from config, resolving providers through the registry
    pub fn from_config(config: &LangRouterConfig, registry: &ProviderRegistry) -> Result<Self> {
        config.validate()?;

        let mut models = Vec::with_capacity(config.models.len());
        for model_config in &config.models {
            if !model_config.enabled {
                info!(
                    router_id = %config.id,
                    model_id = %model_config.id,
                    "Model is disabled, skipping"
                );
                continue;
            }

            let model = LanguageModel::from_config(model_config, registry).map_err(|e| {
                GatewayError::Config(format!(
                    "error initializing model '{}' in router '{}': {}",
                    model_config.id, config.id, e
                ))
            })?;

            debug!(
                router_id = %config.id,
                model_id = %model.id(),
                provider = %model.provider(),
                "Initialized model"
            );
            models.push(Arc::new(model));
        }

        let router = Self::new(
            config.id.clone(),
            config.strategy,
            models,
            ExpRetry::from_config(&config.retry),
        )?;

        if router.models.len() == 1 {
            warn!(
                router_id = %router.id,
                "Router has only one model defined. Add fallback models to make it more resilient"
            );
        }

        if router.stream_models.is_empty() {
            warn!(
                router_id = %router.id,
                "No model in router supports streaming chat, streaming requests will fail"
            );
        }

        Ok(router)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    /// All models, in config order
    pub fn models(&self) -> &[Arc<LanguageModel>] {
        &self.models
    }

    /// Models that can serve streaming requests
    pub fn stream_models(&self) -> &[Arc<LanguageModel>] {
        &self.stream_models
    }

    /// Serve a chat request
    pub async fn chat(&self, cancel: &CancellationToken, req: &ChatRequest) -> Result<ChatResponse> {
        let mut retry = self.retry.iterator();

        while retry.has_next() {
            retry.wait_next(cancel).await?;

            for model in self.chat_routing.iter() {
                if cancel.is_cancelled() {
                    return Err(GatewayError::Cancelled);
                }

                let params = req.params(model.id());

                match model.chat(cancel, &params).await {
                    Ok(mut response) => {
                        response.router_id = self.id.clone();
                        return Ok(response);
                    }
                    Err(ProviderError::Cancelled) => return Err(GatewayError::Cancelled),
                    Err(err) => {
                        warn!(
                            router_id = %self.id,
                            model_id = %model.id(),
                            provider = %model.provider(),
                            error = %err,
                            "Model failed processing chat request"
                        );
                    }
                }
            }

            warn!(
                router_id = %self.id,
                attempt = retry.attempts(),
                "No healthy model found to serve chat request, wait and retry"
            );
        }

        error!(router_id = %self.id, "No model was available to handle chat request");
        Err(GatewayError::NoModelAvailable)
    }

    /// Serve a streaming chat request, pushing chunks and errors to `output`.
    ///
    /// A model failing mid-stream is reported on `output` and the next model
    /// starts the response over. The call ends after a stream completes or
    /// a terminal error is sent. `output` is never closed here.
    pub async fn chat_stream(
        &self,
        cancel: &CancellationToken,
        req: &ChatStreamRequest,
        output: &mpsc::Sender<ChatStreamMessage>,
    ) {
        if self.stream_models.is_empty() {
            self.send_error(
                req,
                output,
                ErrorKind::NoModelConfigured,
                GatewayError::NoModelConfigured.to_string(),
                Some(FinishReason::Error),
            )
            .await;
            return;
        }

        let mut retry = self.retry.iterator();

        while retry.has_next() {
            if retry.wait_next(cancel).await.is_err() {
                self.send_cancelled(req, output).await;
                return;
            }

            'next_model: for model in self.chat_stream_routing.iter() {
                if cancel.is_cancelled() {
                    self.send_cancelled(req, output).await;
                    return;
                }

                let params = req.params(model.id());

                let mut stream = match model.chat_stream(cancel, &params).await {
                    Ok(stream) => stream,
                    Err(ProviderError::Cancelled) => {
                        self.send_cancelled(req, output).await;
                        return;
                    }
                    Err(err) => {
                        warn!(
                            router_id = %self.id,
                            model_id = %model.id(),
                            provider = %model.provider(),
                            error = %err,
                            "Model failed to open chat stream"
                        );
                        continue;
                    }
                };

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        next = stream.next() => Some(next),
                    };

                    let Some(next) = next else {
                        stream.close().await;
                        self.send_cancelled(req, output).await;
                        return;
                    };

                    match next {
                        Some(Ok(chunk)) => {
                            let message =
                                ChatStreamMessage::chunk(&req.id, &self.id, &req.metadata, chunk);

                            if output.send(message).await.is_err() {
                                debug!(router_id = %self.id, "Stream consumer went away");
                                stream.close().await;
                                return;
                            }
                        }
                        Some(Err(ProviderError::Cancelled)) => {
                            self.send_cancelled(req, output).await;
                            return;
                        }
                        Some(Err(err)) => {
                            warn!(
                                router_id = %self.id,
                                model_id = %model.id(),
                                provider = %model.provider(),
                                error = %err,
                                "Model failed processing streaming chat request"
                            );

                            // consumer must drop chunks already received from this model
                            let delivered = self
                                .send_error(req, output, ErrorKind::ModelUnavailable, err.to_string(), None)
                                .await;
                            if !delivered {
                                return;
                            }

                            continue 'next_model;
                        }
                        None => return,
                    }
                }
            }

            warn!(
                router_id = %self.id,
                attempt = retry.attempts(),
                "No healthy model found to serve streaming chat request, wait and retry"
            );
        }

        error!(
            router_id = %self.id,
            "No model was available to handle streaming chat request"
        );

        self.send_error(
            req,
            output,
            ErrorKind::NoModelAvailable,
            GatewayError::NoModelAvailable.to_string(),
            Some(FinishReason::Error),
        )
        .await;
    }

    async fn send_cancelled(&self, req: &ChatStreamRequest, output: &mpsc::Sender<ChatStreamMessage>) {
        self.send_error(
            req,
            output,
            ErrorKind::Cancelled,
            GatewayError::Cancelled.to_string(),
            Some(FinishReason::Error),
        )
        .await;
    }

    /// Returns false when the consumer is gone
    async fn send_error(
        &self,
        req: &ChatStreamRequest,
        output: &mpsc::Sender<ChatStreamMessage>,
        kind: ErrorKind,
        message: String,
        finish_reason: Option<FinishReason>,
    ) -> bool {
        let message = ChatStreamMessage::error(
            &req.id,
            &self.id,
            kind,
            message,
            &req.metadata,
            finish_reason,
        );

        output.send(message).await.is_ok()
    }
}

impl std::fmt::Debug for LangRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangRouter")
            .field("id", &self.id)
            .field("strategy", &self.strategy)
            .field("models", &self.models)
            .field("retry", &self.retry)
            .finish()
    }
}
