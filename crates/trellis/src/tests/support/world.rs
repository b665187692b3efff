//! BDD world: loader, reporter, slot and bootstrap results for step functions.

use std::cell::RefCell;
use std::sync::Arc;

use trellis_config::ConfigNode;

use crate::bootstrap::{Bootstrap, BootstrapError, ConfigLoader, StaticConfigLoader};
use crate::container::{ContainerError, Instance, ServiceContainer};
use crate::slot::ContainerSlot;

use super::ordering::ordering_table;
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub slot: ContainerSlot,
    container: Option<Arc<ServiceContainer>>,
    bootstrap_error: Option<BootstrapError>,
    resolution: Option<Result<Instance, ContainerError>>,
}

impl TestWorld {
    /// Builds a world over an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(StaticConfigLoader::default()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            slot: ContainerSlot::new(),
            container: None,
            bootstrap_error: None,
            resolution: None,
        }
    }

    /// Replaces the configuration returned by the loader.
    pub fn use_config(&mut self, config: ConfigNode) {
        self.loader = Box::new(StaticConfigLoader::new(config));
    }

    /// Runs the bootstrap sequence for `services`.
    pub fn bootstrap(&mut self, services: &[&str]) {
        let reporter = Arc::clone(&self.reporter);
        let result = Bootstrap::new(&*self.loader, &self.slot)
            .with_reporter(reporter)
            .with_initializers(ordering_table())
            .run(services);
        match result {
            Ok(container) => self.container = Some(container),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Resolves `name` from the published container.
    pub fn resolve(&mut self, name: &str) {
        self.resolution = Some(self.slot.resolve(name));
    }

    /// Error raised by the last bootstrap, if any.
    #[must_use]
    pub const fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Container returned by the last successful bootstrap.
    #[must_use]
    pub fn container(&self) -> Option<&ServiceContainer> {
        self.container.as_deref()
    }

    /// Result of the last resolution.
    #[must_use]
    pub const fn resolution(&self) -> Option<&Result<Instance, ContainerError>> {
        self.resolution.as_ref()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh world wrapped for shared step access.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
