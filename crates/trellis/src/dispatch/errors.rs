//! Failures raised while dispatching a request to a handler.

use std::error::Error;
use std::sync::Arc;

use strum::Display;
use thiserror::Error;

use crate::container::ContainerError;

/// Classification used to pick an error route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// No handler group exists for the target.
    HandlerNotFound,
    /// The handler group exists but lacks the action.
    ActionNotFound,
    /// Anything else.
    Other,
}

/// Errors surfaced by request handlers.
#[derive(Debug, Clone, Error)]
pub enum DispatchFailure {
    /// No handler group exists for the target.
    #[error("handler '{handler}' was not found")]
    HandlerNotFound {
        /// Requested handler group.
        handler: String,
    },
    /// The handler group exists but lacks the action.
    #[error("action '{action}' was not found on handler '{handler}'")]
    ActionNotFound {
        /// Requested handler group.
        handler: String,
        /// Requested action.
        action: String,
    },
    /// A handler raised an error of its own.
    #[error("{0}")]
    Raised(Arc<dyn Error + Send + Sync>),
}

impl DispatchFailure {
    /// Builds a handler-not-found failure.
    pub fn handler_not_found(handler: impl Into<String>) -> Self {
        Self::HandlerNotFound {
            handler: handler.into(),
        }
    }

    /// Builds an action-not-found failure.
    pub fn action_not_found(handler: impl Into<String>, action: impl Into<String>) -> Self {
        Self::ActionNotFound {
            handler: handler.into(),
            action: action.into(),
        }
    }

    /// Wraps an arbitrary handler error.
    pub fn raised(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Raised(Arc::new(error))
    }

    /// Category used by the error policy.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::HandlerNotFound { .. } => ErrorCategory::HandlerNotFound,
            Self::ActionNotFound { .. } => ErrorCategory::ActionNotFound,
            Self::Raised(_) => ErrorCategory::Other,
        }
    }
}

impl From<ContainerError> for DispatchFailure {
    fn from(error: ContainerError) -> Self {
        Self::raised(error)
    }
}
