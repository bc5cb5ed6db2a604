//! Router Configuration
//!
//! Defines the configuration schema for routers and their model pools.

use crate::error::{GatewayError, Result};
use crate::resiliency::health::ErrorBudget;
use crate::resiliency::retry::RetryConfig;
use crate::router::latency::LatencyConfig;
use crate::router::routing::RoutingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub routers: RoutersConfig,
}

impl GatewayConfig {
    /// Check cross-router constraints. Router IDs must be unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for router in &self.routers.language {
            if !seen.insert(router.id.as_str()) {
                return Err(GatewayError::Config(format!(
                    "router ID '{}' is used more than once, router IDs must be unique",
                    router.id
                )));
            }
        }

        Ok(())
    }
}

/// Routers grouped by the kind of traffic they serve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutersConfig {
    #[serde(default)]
    pub language: Vec<LangRouterConfig>,
}

/// Configuration for a single language router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LangRouterConfig {
    /// Unique router ID
    pub id: String,

    /// Disabled routers are skipped at build time
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How to pick a model from the pool
    #[serde(default)]
    pub strategy: RoutingStrategy,

    /// Pool-wide retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Model pool, in priority order
    pub models: Vec<ModelConfig>,
}

impl LangRouterConfig {
    pub fn new(id: impl Into<String>, models: Vec<ModelConfig>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            strategy: RoutingStrategy::default(),
            retry: RetryConfig::default(),
            models,
        }
    }

    /// Check the pool: model IDs are unique and at least one model is enabled
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(GatewayError::Config("router ID must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            // disabled models count too, so enabling one later can't collide
            if !seen.insert(model.id.as_str()) {
                return Err(GatewayError::Config(format!(
                    "ID '{}' is specified for more than one model in router '{}', while it should be unique",
                    model.id, self.id
                )));
            }
        }

        if !self.models.iter().any(|m| m.enabled) {
            return Err(GatewayError::Config(format!(
                "router '{}' must have at least one active model, zero defined",
                self.id
            )));
        }

        Ok(())
    }

    /// Enabled models, in config order
    pub fn enabled_models(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter().filter(|m| m.enabled)
    }
}

/// Configuration for one model instance in a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model instance ID, unique within its router
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Share of traffic. Only used by the `weighted_round_robin` strategy.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Errors tolerated per window before the model is taken out of rotation
    #[serde(default)]
    pub error_budget: ErrorBudget,

    #[serde(default)]
    pub latency: LatencyConfig,

    /// Backend client settings
    pub provider: ProviderConfig,
}

impl ModelConfig {
    pub fn new(id: impl Into<String>, provider: ProviderConfig) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            weight: default_weight(),
            error_budget: ErrorBudget::default(),
            latency: LatencyConfig::default(),
            provider,
        }
    }
}

/// Provider client settings.
///
/// `type` selects the client from the provider registry; every other field is
/// handed to that client as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ProviderConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Set a client parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Deserialize the client parameters into the client's own config type
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(serde_json::Value::Object(self.params.clone())).map_err(|e| {
            GatewayError::Config(format!("invalid '{}' provider config: {}", self.kind, e))
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}
