//! Configuration Module
//!
//! Router, model and provider configuration, and loading it from disk.

pub mod duration;
pub mod loader;
pub mod router;

pub use loader::ConfigLoader;
pub use router::{GatewayConfig, LangRouterConfig, ModelConfig, ProviderConfig, RoutersConfig};
