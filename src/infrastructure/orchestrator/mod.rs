//! Provider orchestration: routing, fallback, caching and admin operations

mod health;
mod manager;
mod registry;
mod stream;
mod validation;

pub use health::{HealthStatus, ProviderHealth, SystemHealth};
pub use manager::{ForcedStatus, ServiceManager};
pub use registry::{ProviderEntry, Route, RoutingTable};
pub use stream::CompletionStream;
pub use validation::{validate_config, ValidationReport};
