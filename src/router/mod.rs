//! Router Module
//!
//! Picks model instances for incoming requests and keeps requests alive
//! through model failures.

pub mod lang;
pub mod latency;
pub mod manager;
pub mod routing;

pub use lang::LangRouter;
pub use latency::{LatencyConfig, MovingAverage};
pub use manager::{ModelDescriptor, RouterDescriptor, RouterManager};
pub use routing::{LangModelRouting, ModelIterator, RoutingStrategy};
