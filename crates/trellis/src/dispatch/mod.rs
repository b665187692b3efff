//! Request dispatch and error forwarding.
//!
//! A [`Dispatcher`] runs a two-state machine. While `Dispatching`, a failure
//! from the handler is classified by the [`ErrorPolicy`] and the machine
//! moves to `Forwarding` with the routed target. Whatever the forwarded
//! handler returns ends dispatch; its failures are reported as
//! [`DispatchOutcome::Unguarded`] rather than intercepted again.

mod dispatcher;
mod errors;
mod policy;

pub use self::dispatcher::{DispatchOutcome, Dispatcher, RequestHandler, init_dispatcher};
pub use self::errors::{DispatchFailure, ErrorCategory};
pub use self::policy::{
    DEFAULT_ERROR_HANDLER, DEFAULT_ERROR_NAMESPACE, ErrorPolicy, FAILURE_ACTION, ForwardParam,
    ForwardTarget, NOT_FOUND_ACTION,
};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Dispatcher service.
pub const DISPATCHER: &str = "dispatcher";
