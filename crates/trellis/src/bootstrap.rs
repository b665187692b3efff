//! Bootstrap orchestration.
//!
//! A run loads and merges configuration, registers namespaces, then invokes
//! the initializer for each requested service in the order given. The
//! finished container is published only when every step succeeds; on
//! failure the partially populated container is dropped.

use std::sync::Arc;

use thiserror::Error;

use trellis_config::{ConfigError, ConfigNode, ConfigSources, ConfigValueError, LoggingSettings};

use crate::container::{ContainerError, ServiceContainer};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::initializers::{InitializerError, InitializerTable};
use crate::namespaces::NamespaceRegistry;
use crate::slot::ContainerSlot;
use crate::telemetry::{self, TelemetryError};

/// Name of the merged configuration instance.
pub const CONFIG_SERVICE: &str = "config";

/// Name of the namespace registry instance.
pub const LOADER_SERVICE: &str = "loader";

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the merged configuration tree.
    fn load(&self) -> Result<ConfigNode, ConfigError>;
}

/// Loader that merges a base and a local TOML source from disk.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfigLoader {
    sources: ConfigSources,
}

impl LayeredConfigLoader {
    /// Builds a loader over the given sources.
    #[must_use]
    pub const fn new(sources: ConfigSources) -> Self {
        Self { sources }
    }
}

impl ConfigLoader for LayeredConfigLoader {
    fn load(&self) -> Result<ConfigNode, ConfigError> {
        self.sources.load()
    }
}

/// Loader returning a configuration prepared in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigLoader {
    config: ConfigNode,
}

impl StaticConfigLoader {
    /// Wraps a prepared configuration tree.
    #[must_use]
    pub const fn new(config: ConfigNode) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<ConfigNode, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load or merge.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// The `[logging]` table could not be read.
    #[error("invalid logging settings: {source}")]
    Logging {
        /// Offending configuration value.
        #[source]
        source: ConfigValueError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The `[namespaces]` table could not be read.
    #[error("failed to register namespaces: {source}")]
    Namespaces {
        /// Offending configuration value.
        #[source]
        source: ConfigValueError,
    },
    /// A requested service has no initializer.
    #[error("no initializer registered for service '{name}'")]
    UnknownService {
        /// Requested service name.
        name: String,
    },
    /// A service initializer failed.
    #[error("failed to initialise service '{service}': {source}")]
    Initializer {
        /// Service whose initializer failed.
        service: String,
        /// Underlying initializer error.
        #[source]
        source: InitializerError,
    },
}

impl BootstrapError {
    /// Returns the container error raised by a failing initializer, if any.
    #[must_use]
    pub const fn container_error(&self) -> Option<&ContainerError> {
        match self {
            Self::Initializer {
                source: InitializerError::Container(error),
                ..
            } => Some(error),
            _ => None,
        }
    }
}

/// Ordered bootstrap sequence over a loader, initializer table, and slot.
pub struct Bootstrap<'a> {
    loader: &'a dyn ConfigLoader,
    slot: &'a ContainerSlot,
    reporter: Arc<dyn HealthReporter>,
    initializers: InitializerTable,
}

impl<'a> Bootstrap<'a> {
    /// Builds a sequence using the built-in initializers and the structured
    /// health reporter.
    #[must_use]
    pub fn new(loader: &'a dyn ConfigLoader, slot: &'a ContainerSlot) -> Self {
        Self {
            loader,
            slot,
            reporter: Arc::new(StructuredHealthReporter::new()),
            initializers: InitializerTable::builtin(),
        }
    }

    /// Replaces the health reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn HealthReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replaces the initializer table.
    #[must_use]
    pub fn with_initializers(mut self, initializers: InitializerTable) -> Self {
        self.initializers = initializers;
        self
    }

    /// Runs the sequence for `services`, in order, and publishes the result.
    ///
    /// An empty list registers only `config` and `loader`.
    ///
    /// # Errors
    ///
    /// Returns the first [`BootstrapError`] raised; nothing is published in
    /// that case.
    pub fn run<S>(&self, services: &[S]) -> Result<Arc<ServiceContainer>, BootstrapError>
    where
        S: AsRef<str>,
    {
        self.reporter.bootstrap_starting();

        match self.assemble(services) {
            Ok(container) => {
                let container = Arc::new(container);
                self.slot.publish(Arc::clone(&container));
                self.reporter.bootstrap_succeeded(&container);
                Ok(container)
            }
            Err(error) => {
                self.reporter.bootstrap_failed(&error);
                Err(error)
            }
        }
    }

    fn assemble<S>(&self, services: &[S]) -> Result<ServiceContainer, BootstrapError>
    where
        S: AsRef<str>,
    {
        let config = self
            .loader
            .load()
            .map_err(|source| BootstrapError::Configuration { source })?;

        let logging =
            LoggingSettings::from_node(&config).map_err(|source| BootstrapError::Logging { source })?;
        telemetry::initialise(&logging).map_err(|source| BootstrapError::Telemetry { source })?;

        let namespaces = NamespaceRegistry::from_config(&config)
            .map_err(|source| BootstrapError::Namespaces { source })?;

        let container = ServiceContainer::new();
        container.register_instance(CONFIG_SERVICE, config);
        container.register_instance(LOADER_SERVICE, namespaces);

        for requested in services {
            let name = requested.as_ref();
            let initializer =
                self.initializers
                    .get(name)
                    .ok_or_else(|| BootstrapError::UnknownService {
                        name: name.to_owned(),
                    })?;

            self.reporter.service_initialising(name);
            initializer(&container).map_err(|source| BootstrapError::Initializer {
                service: name.to_owned(),
                source,
            })?;
            self.reporter.service_registered(name);
        }

        Ok(container)
    }
}
