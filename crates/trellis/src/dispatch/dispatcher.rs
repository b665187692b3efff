//! Request dispatch with a single error forward.

use std::sync::Arc;

use tracing::{debug, warn};
use trellis_config::ConfigNode;

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::errors::DispatchFailure;
use super::policy::{DEFAULT_ERROR_NAMESPACE, ErrorPolicy, ForwardTarget};
use super::{DISPATCH_TARGET, DISPATCHER};

/// Executes a resolved target.
pub trait RequestHandler {
    /// Value produced by a successful action.
    type Response;

    /// Runs the action named by `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchFailure`] when the handler group or action does not
    /// exist or the action fails.
    fn handle(&self, target: &ForwardTarget) -> Result<Self::Response, DispatchFailure>;
}

/// Result of one dispatch.
#[derive(Debug)]
pub enum DispatchOutcome<R> {
    /// The requested action succeeded.
    Completed(R),
    /// The requested action failed and the error route succeeded.
    Forwarded {
        /// Error route that produced the response. Its parameters may carry
        /// the original failure.
        target: ForwardTarget,
        /// Response from the error route.
        response: R,
    },
    /// The error route itself failed. This failure is not intercepted again.
    Unguarded {
        /// Error route that failed.
        target: ForwardTarget,
        /// Failure raised by the error route.
        failure: DispatchFailure,
    },
}

impl<R> DispatchOutcome<R> {
    /// Response, when one was produced.
    pub fn into_response(self) -> Option<R> {
        match self {
            Self::Completed(response) | Self::Forwarded { response, .. } => Some(response),
            Self::Unguarded { .. } => None,
        }
    }
}

enum DispatchState {
    Dispatching(ForwardTarget),
    Forwarding(ForwardTarget),
}

/// Dispatches targets to a [`RequestHandler`], forwarding failures once
/// through an [`ErrorPolicy`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    default_namespace: String,
    policy: ErrorPolicy,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_NAMESPACE, ErrorPolicy::default())
    }
}

impl Dispatcher {
    /// Builds a dispatcher.
    #[must_use]
    pub fn new(default_namespace: impl Into<String>, policy: ErrorPolicy) -> Self {
        Self {
            default_namespace: default_namespace.into(),
            policy,
        }
    }

    /// Namespace applied to unqualified targets.
    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Error policy consulted on failure.
    #[must_use]
    pub const fn policy(&self) -> &ErrorPolicy {
        &self.policy
    }

    /// Dispatches `target` to `handler`.
    ///
    /// A failure in the requested action is classified and forwarded to the
    /// error route; the catch-all route carries a clone of the original
    /// failure.
    /// A failure in the error route ends dispatch as
    /// [`DispatchOutcome::Unguarded`].
    pub fn dispatch<H>(&self, target: ForwardTarget, handler: &H) -> DispatchOutcome<H::Response>
    where
        H: RequestHandler + ?Sized,
    {
        let mut state = DispatchState::Dispatching(target.qualify(&self.default_namespace));
        loop {
            state = match state {
                DispatchState::Dispatching(target) => {
                    debug!(target: DISPATCH_TARGET, route = %target, "dispatching");
                    match handler.handle(&target) {
                        Ok(response) => return DispatchOutcome::Completed(response),
                        Err(failure) => {
                            let forward = self.policy.classify_and_route(&failure);
                            warn!(
                                target: DISPATCH_TARGET,
                                route = %target,
                                category = %failure.category(),
                                forward = %forward,
                                error = %failure,
                                "dispatch failed; forwarding to error route"
                            );
                            DispatchState::Forwarding(forward.qualify(&self.default_namespace))
                        }
                    }
                }
                DispatchState::Forwarding(target) => {
                    return match handler.handle(&target) {
                        Ok(response) => DispatchOutcome::Forwarded { target, response },
                        Err(failure) => {
                            warn!(
                                target: DISPATCH_TARGET,
                                route = %target,
                                error = %failure,
                                "error route failed"
                            );
                            DispatchOutcome::Unguarded { target, failure }
                        }
                    };
                }
            };
        }
    }
}

struct DispatcherFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for DispatcherFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        let namespace = self
            .config
            .str_or("dispatcher.default_namespace", DEFAULT_ERROR_NAMESPACE)?;
        let policy = ErrorPolicy::from_config(&self.config)?;
        Ok(instance(Dispatcher::new(namespace, policy)))
    }
}

/// Registers the shared `dispatcher` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_dispatcher(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = crate::services::config(container)?;
    container.register(DISPATCHER, DispatcherFactory { config }, Lifetime::Shared);
    Ok(())
}
