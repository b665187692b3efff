//! Publication slot for the active container.
//!
//! A bootstrap run publishes its finished container into a [`ContainerSlot`].
//! Callers normally receive the slot (or the container itself) by context;
//! [`ContainerSlot::global`] exists for code that sits outside any call chain
//! that could hand it a reference.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use once_cell::sync::Lazy;

use crate::container::{ContainerError, Instance, ServiceContainer};

static GLOBAL_SLOT: Lazy<ContainerSlot> = Lazy::new(ContainerSlot::new);

/// Holds at most one published container.
///
/// Publishing is a single atomic pointer swap, so readers observe either the
/// previous container or the new one, never a partially built container.
#[derive(Debug, Default)]
pub struct ContainerSlot {
    current: ArcSwapOption<ServiceContainer>,
}

impl ContainerSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide slot.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_SLOT
    }

    /// Publishes `container`, returning the previously published one.
    pub fn publish(&self, container: Arc<ServiceContainer>) -> Option<Arc<ServiceContainer>> {
        self.current.swap(Some(container))
    }

    /// Empties the slot, returning the container that was published.
    pub fn clear(&self) -> Option<Arc<ServiceContainer>> {
        self.current.swap(None)
    }

    /// Returns the published container.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NoDefault`] when nothing has been published.
    pub fn current(&self) -> Result<Arc<ServiceContainer>, ContainerError> {
        self.current.load_full().ok_or(ContainerError::NoDefault)
    }

    /// Returns `true` when a container has been published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.current.load().is_some()
    }

    /// Resolves `name` from the published container.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NoDefault`] when nothing has been published,
    /// otherwise any error raised by [`ServiceContainer::resolve`].
    pub fn resolve(&self, name: &str) -> Result<Instance, ContainerError> {
        self.current()?.resolve(name)
    }
}

/// Returns the container published to the process-wide slot.
///
/// # Errors
///
/// Returns [`ContainerError::NoDefault`] when no bootstrap has published one.
pub fn default_container() -> Result<Arc<ServiceContainer>, ContainerError> {
    ContainerSlot::global().current()
}
