//! Structured health reporting for bootstrap lifecycle events.

use std::sync::Arc;

use crate::bootstrap::BootstrapError;
use crate::container::ServiceContainer;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked before a service initializer runs.
    fn service_initialising(&self, service: &str);

    /// Invoked after a service initializer registers its entries.
    fn service_registered(&self, service: &str);

    /// Invoked after the container has been published.
    fn bootstrap_succeeded(&self, container: &ServiceContainer);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn service_initialising(&self, service: &str) {
        (**self).service_initialising(service);
    }

    fn service_registered(&self, service: &str) {
        (**self).service_registered(service);
    }

    fn bootstrap_succeeded(&self, container: &ServiceContainer) {
        (**self).bootstrap_succeeded(container);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "trellis::health",
            event = "bootstrap_starting",
            "starting bootstrap"
        );
    }

    fn service_initialising(&self, service: &str) {
        tracing::debug!(
            target: "trellis::health",
            event = "service_initialising",
            service,
            "running service initializer"
        );
    }

    fn service_registered(&self, service: &str) {
        tracing::debug!(
            target: "trellis::health",
            event = "service_registered",
            service,
            "service registered"
        );
    }

    fn bootstrap_succeeded(&self, container: &ServiceContainer) {
        tracing::info!(
            target: "trellis::health",
            event = "bootstrap_succeeded",
            services = ?container.names(),
            "bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "trellis::health",
            event = "bootstrap_failed",
            error = %error,
            "bootstrap failed"
        );
    }
}
