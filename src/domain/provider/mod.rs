//! Provider adapter contract and provider profiles

mod adapter;
mod capability;
mod profile;

pub use adapter::{ChunkStream, ProviderAdapter};
pub use capability::{Capability, CapabilitySet};
pub use profile::{ProviderKind, ProviderProfile};

#[cfg(test)]
pub use adapter::mock::{MockAdapter, MockBehavior};
