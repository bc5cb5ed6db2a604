//! Router Manager
//!
//! Owns every configured router and looks them up by ID.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::model::Model;
use crate::provider::ProviderRegistry;
use crate::router::lang::LangRouter;
use crate::router::routing::RoutingStrategy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Public view of a model instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub provider: String,
    pub model_name: String,
    pub healthy: bool,
    pub weight: u32,
    pub supports_streaming: bool,
}

/// Public view of a router
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterDescriptor {
    pub id: String,
    pub strategy: RoutingStrategy,
    pub models: Vec<ModelDescriptor>,
}

impl RouterDescriptor {
    fn describe(router: &LangRouter) -> Self {
        Self {
            id: router.id().to_string(),
            strategy: router.strategy(),
            models: router
                .models()
                .iter()
                .map(|m| ModelDescriptor {
                    id: m.id().to_string(),
                    provider: m.provider().to_string(),
                    model_name: m.model_name().to_string(),
                    healthy: m.healthy(),
                    weight: m.weight(),
                    supports_streaming: m.supports_chat_stream(),
                })
                .collect(),
        }
    }
}

/// Registry of language routers, in config order
#[derive(Debug, Default)]
pub struct RouterManager {
    routers: Vec<Arc<LangRouter>>,
    by_id: HashMap<String, Arc<LangRouter>>,
}

impl RouterManager {
    /// Create a manager over already built routers. Router IDs must be unique.
    pub fn new(routers: Vec<LangRouter>) -> Result<Self> {
        let mut manager = Self::default();

        for router in routers {
            if manager.by_id.contains_key(router.id()) {
                return Err(GatewayError::Config(format!(
                    "router ID '{}' is used more than once, router IDs must be unique",
                    router.id()
                )));
            }

            let router = Arc::new(router);
            manager.by_id.insert(router.id().to_string(), router.clone());
            manager.routers.push(router);
        }

        Ok(manager)
    }

    /// Build every enabled router in the config.
    ///
    /// All router errors are collected, so one failed build reports every
    /// broken router at once.
    pub fn from_config(config: &GatewayConfig, registry: &ProviderRegistry) -> Result<Self> {
        config.validate()?;

        let mut routers = Vec::new();
        let mut errors = Vec::new();

        for router_config in &config.routers.language {
            if !router_config.enabled {
                info!(router_id = %router_config.id, "Router is disabled, skipping");
                continue;
            }

            match LangRouter::from_config(router_config, registry) {
                Ok(router) => routers.push(router),
                Err(e) => errors.push(e.to_string()),
            }
        }

        if !errors.is_empty() {
            return Err(GatewayError::Config(errors.join("; ")));
        }

        info!(routers = routers.len(), "Initialized language routers");
        Self::new(routers)
    }

    /// Look up a router
    pub fn get_router(&self, id: &str) -> Result<Arc<LangRouter>> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::RouterNotFound(id.to_string()))
    }

    /// Describe all routers and their models
    pub fn list_routers(&self) -> Vec<RouterDescriptor> {
        self.routers
            .iter()
            .map(|r| RouterDescriptor::describe(r))
            .collect()
    }

    /// All routers, in config order
    pub fn routers(&self) -> &[Arc<LangRouter>] {
        &self.routers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LangRouterConfig, ModelConfig, ProviderConfig};
    use crate::provider::testing::MockProvider;
    use crate::provider::LangProvider;

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry
            .register("mock", |_: &ProviderConfig| {
                Ok(Arc::new(MockProvider::ok("hi")) as Arc<dyn LangProvider>)
            })
            .unwrap();
        registry
    }

    fn router_config(id: &str, model_ids: &[&str]) -> LangRouterConfig {
        LangRouterConfig::new(
            id,
            model_ids
                .iter()
                .map(|m| ModelConfig::new(*m, ProviderConfig::new("mock")))
                .collect(),
        )
    }

    fn gateway_config(routers: Vec<LangRouterConfig>) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.routers.language = routers;
        config
    }

    #[test]
    fn test_build_and_lookup() {
        let mut disabled = router_config("off", &["x"]);
        disabled.enabled = false;

        let config = gateway_config(vec![
            router_config("default", &["a", "b"]),
            router_config("cheap", &["c"]),
            disabled,
        ]);

        let manager = RouterManager::from_config(&config, &registry()).unwrap();
        assert_eq!(manager.routers().len(), 2);
        assert_eq!(manager.get_router("cheap").unwrap().id(), "cheap");

        assert!(matches!(
            manager.get_router("off"),
            Err(GatewayError::RouterNotFound(id)) if id == "off"
        ));
    }

    #[test]
    fn test_list_routers() {
        let config = gateway_config(vec![router_config("default", &["a", "b"])]);
        let manager = RouterManager::from_config(&config, &registry()).unwrap();

        let routers = manager.list_routers();
        assert_eq!(routers.len(), 1);
        assert_eq!(routers[0].strategy, RoutingStrategy::Priority);

        let ids: Vec<_> = routers[0].models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(routers[0].models.iter().all(|m| m.healthy && !m.supports_streaming));
        assert_eq!(routers[0].models[0].provider, "provider_mock");
    }

    #[test]
    fn test_duplicate_router_ids() {
        let config = gateway_config(vec![router_config("r", &["a"]), router_config("r", &["b"])]);
        assert!(matches!(
            RouterManager::from_config(&config, &registry()),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_collects_all_router_errors() {
        let config = gateway_config(vec![
            router_config("empty", &[]),
            router_config("dup", &["a", "a"]),
            router_config("fine", &["a"]),
        ]);

        let err = RouterManager::from_config(&config, &registry()).unwrap_err();
        let GatewayError::Config(msg) = err else {
            panic!("expected config error, got {:?}", err);
        };
        assert!(msg.contains("'empty'"));
        assert!(msg.contains("'dup'"));
        assert!(msg.contains("; "));
    }
}
