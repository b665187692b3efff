//! Model behaviors.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use strum::Display;

use crate::container::{FactoryError, Lifetime, ServiceContainer};
use crate::initializers::InitializerError;

use super::BEHAVIOR_TIMESTAMP;

/// Persistence events a behavior reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ModelEvent {
    /// A record is about to be inserted.
    BeforeCreate,
    /// An existing record is about to be saved.
    BeforeUpdate,
}

/// Stamps creation and modification times, in Unix seconds, onto records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampBehavior {
    created_field: String,
    modified_field: String,
}

impl Default for TimestampBehavior {
    fn default() -> Self {
        Self::new("created_at", "modified_at")
    }
}

impl TimestampBehavior {
    /// Builds a behavior writing to the given fields.
    #[must_use]
    pub fn new(created_field: impl Into<String>, modified_field: impl Into<String>) -> Self {
        Self {
            created_field: created_field.into(),
            modified_field: modified_field.into(),
        }
    }

    /// Field assignments for `event` at time `now`.
    ///
    /// Creation sets both fields; updates touch only the modification field.
    #[must_use]
    pub fn stamp(&self, event: ModelEvent, now: SystemTime) -> Vec<(&str, u64)> {
        let seconds = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        match event {
            ModelEvent::BeforeCreate => vec![
                (self.created_field.as_str(), seconds),
                (self.modified_field.as_str(), seconds),
            ],
            ModelEvent::BeforeUpdate => vec![(self.modified_field.as_str(), seconds)],
        }
    }
}

/// Registers the transient `behavior_timestamp` service.
///
/// # Errors
///
/// Never fails; the signature matches the other initializers.
pub fn init_behaviors(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(BEHAVIOR_TIMESTAMP, Lifetime::Transient, |_| {
        Ok::<_, FactoryError>(TimestampBehavior::default())
    });
    Ok(())
}
