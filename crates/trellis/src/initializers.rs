//! Name to initializer mapping consulted by the bootstrap sequence.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use trellis_config::ConfigValueError;

use crate::container::{ContainerError, ServiceContainer};
use crate::{dispatch, services};

/// Registers one named service (and any helpers it owns) on the container.
///
/// Initializers may resolve services registered earlier in the sequence;
/// doing so is an explicit ordering dependency.
pub type Initializer = fn(&ServiceContainer) -> Result<(), InitializerError>;

/// Errors raised by an initializer.
#[derive(Debug, Error)]
pub enum InitializerError {
    /// Resolving a collaborator failed.
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// A configuration value read at registration time was unusable.
    #[error(transparent)]
    Config(#[from] ConfigValueError),
}

/// Explicit table of initializers keyed by service name.
#[derive(Clone, Default)]
pub struct InitializerTable {
    entries: BTreeMap<String, Initializer>,
}

impl InitializerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every built-in service initializer.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with(services::ROUTER, services::init_router)
            .with(services::VIEW, services::init_view)
            .with(services::URL, services::init_url)
            .with(services::COOKIES, services::init_cookies)
            .with(services::SESSION, services::init_session)
            .with(services::PROFILER, services::init_profiler)
            .with(services::DB, services::init_db)
            .with(services::CACHE, services::init_cache)
            .with(services::UTIL, services::init_util)
            .with(services::VALIDATE, services::init_validate)
            .with(services::MONGO, services::init_mongo)
            .with(services::COLLECTION_MANAGER, services::init_collection_manager)
            .with(services::BEHAVIORS, services::init_behaviors)
            .with(services::DATA_CACHE, services::init_data_cache)
            .with(services::AUTH, services::init_auth)
            .with(dispatch::DISPATCHER, dispatch::init_dispatcher)
    }

    /// Adds or replaces the initializer for `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, initializer: Initializer) -> Self {
        self.insert(name, initializer);
        self
    }

    /// Adds or replaces the initializer for `name` in place.
    pub fn insert(&mut self, name: impl Into<String>, initializer: Initializer) {
        self.entries.insert(name.into(), initializer);
    }

    /// Looks up the initializer registered for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Initializer> {
        self.entries.get(name).copied()
    }

    /// Names with a registered initializer, in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for InitializerTable {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.names()).finish()
    }
}
