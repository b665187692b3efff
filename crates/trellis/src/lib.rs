//! Service container and bootstrap layer for a web application.
//!
//! A bootstrap run loads two layered TOML sources through
//! [`trellis_config`], registers the merged tree and the namespace registry,
//! then invokes the initializer for each requested service in the order
//! given. Initializers register named entries on a [`ServiceContainer`];
//! factories stay dormant until something resolves them. Shared entries
//! build once and are cached. Transient entries build on every resolution.
//!
//! Ordering matters only where an initializer resolves another service while
//! it runs (`db` resolves `profiler`, for example). Dependencies resolved
//! inside a factory body are looked up when that factory runs, so their
//! position in the list is irrelevant.
//!
//! The finished container is published to a [`ContainerSlot`]. Nothing is
//! published when any step fails.
//!
//! ## Error forwarding
//!
//! The [`dispatch`] module provides a total [`ErrorPolicy`] and a
//! [`Dispatcher`] that forwards a failed dispatch exactly once to the routed
//! error handler.

mod bootstrap;
mod container;
pub mod dispatch;
mod health;
mod initializers;
mod namespaces;
pub mod services;
mod slot;
mod telemetry;

pub use bootstrap::{
    Bootstrap, BootstrapError, CONFIG_SERVICE, ConfigLoader, LOADER_SERVICE, LayeredConfigLoader,
    StaticConfigLoader,
};
pub use container::{
    ContainerError, FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
pub use dispatch::{Dispatcher, ErrorPolicy};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use initializers::{Initializer, InitializerError, InitializerTable};
pub use namespaces::{DEFAULT_NAMESPACES, NamespaceRegistry};
pub use slot::{ContainerSlot, default_container};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
