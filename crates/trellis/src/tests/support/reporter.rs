//! Test double for [`HealthReporter`] that records lifecycle events.

use std::sync::Mutex;

use crate::bootstrap::BootstrapError;
use crate::container::ServiceContainer;
use crate::health::HealthReporter;

/// Lifecycle events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// An initializer is about to run.
    ServiceInitialising(String),
    /// An initializer finished.
    ServiceRegistered(String),
    /// Bootstrap published a container holding these names.
    BootstrapSucceeded(Vec<String>),
    /// Bootstrap failed with this message.
    BootstrapFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn service_initialising(&self, service: &str) {
        self.record(HealthEvent::ServiceInitialising(service.to_owned()));
    }

    fn service_registered(&self, service: &str) {
        self.record(HealthEvent::ServiceRegistered(service.to_owned()));
    }

    fn bootstrap_succeeded(&self, container: &ServiceContainer) {
        self.record(HealthEvent::BootstrapSucceeded(container.names()));
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }
}
