//! Declarative mapping from dispatch failures to error handlers.
//!
//! The policy holds an ordered list of category-specific routes and a
//! catch-all target. Specific routes are checked first; the catch-all always
//! matches, so every failure has somewhere to go.

use std::fmt;

use trellis_config::{ConfigNode, ConfigValueError};

use super::errors::{DispatchFailure, ErrorCategory};

/// Namespace used by the default error routes.
pub const DEFAULT_ERROR_NAMESPACE: &str = "Controllers";
/// Handler group used by the default error routes.
pub const DEFAULT_ERROR_HANDLER: &str = "error";
/// Action used for not-found failures.
pub const NOT_FOUND_ACTION: &str = "show404";
/// Action used for every other failure.
pub const FAILURE_ACTION: &str = "show500";

/// Positional parameter passed to a forwarded action.
#[derive(Debug, Clone)]
pub enum ForwardParam {
    /// Explicitly empty slot.
    Null,
    /// Literal text.
    Text(String),
    /// The failure that triggered the forward.
    Failure(DispatchFailure),
}

/// Where a request is dispatched: namespace, handler group, action and
/// positional parameters.
#[derive(Debug, Clone)]
pub struct ForwardTarget {
    namespace: String,
    handler_group: String,
    action: String,
    params: Vec<ForwardParam>,
}

impl ForwardTarget {
    /// Builds a target with no parameters.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        handler_group: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            handler_group: handler_group.into(),
            action: action.into(),
            params: Vec::new(),
        }
    }

    /// Builds a target without a namespace; the dispatcher fills in its
    /// default.
    #[must_use]
    pub fn unqualified(handler_group: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(String::new(), handler_group, action)
    }

    /// Replaces the parameters.
    #[must_use]
    pub fn with_params(mut self, params: Vec<ForwardParam>) -> Self {
        self.params = params;
        self
    }

    /// Namespace; empty for unqualified targets.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Handler group.
    #[must_use]
    pub fn handler_group(&self) -> &str {
        &self.handler_group
    }

    /// Action.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Positional parameters.
    #[must_use]
    pub fn params(&self) -> &[ForwardParam] {
        &self.params
    }

    /// Failure carried in the parameters, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&DispatchFailure> {
        self.params.iter().find_map(|param| match param {
            ForwardParam::Failure(failure) => Some(failure),
            ForwardParam::Null | ForwardParam::Text(_) => None,
        })
    }

    pub(crate) fn qualify(mut self, default_namespace: &str) -> Self {
        if self.namespace.is_empty() {
            default_namespace.clone_into(&mut self.namespace);
        }
        self
    }
}

impl fmt::Display for ForwardTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}/{}/{}",
            self.namespace, self.handler_group, self.action
        )
    }
}

/// Total mapping from [`DispatchFailure`] to a [`ForwardTarget`].
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    routes: Vec<(ErrorCategory, ForwardTarget)>,
    fallback: ForwardTarget,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        let not_found = ForwardTarget::new(
            DEFAULT_ERROR_NAMESPACE,
            DEFAULT_ERROR_HANDLER,
            NOT_FOUND_ACTION,
        );
        let failure = ForwardTarget::new(
            DEFAULT_ERROR_NAMESPACE,
            DEFAULT_ERROR_HANDLER,
            FAILURE_ACTION,
        );
        Self::new(failure)
            .with_route(ErrorCategory::HandlerNotFound, not_found.clone())
            .with_route(ErrorCategory::ActionNotFound, not_found)
    }
}

impl ErrorPolicy {
    /// Builds a policy with only a catch-all target.
    #[must_use]
    pub const fn new(fallback: ForwardTarget) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    /// Appends a route for `category`; earlier routes take precedence.
    #[must_use]
    pub fn with_route(mut self, category: ErrorCategory, target: ForwardTarget) -> Self {
        self.routes.push((category, target));
        self
    }

    /// Reads overrides from `[errors.not_found]` and `[errors.failure]`.
    ///
    /// Each table may set `namespace`, `handler` and `action`; unset keys keep
    /// the default route's values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError::WrongType`] when an override is not a
    /// string.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        let not_found = configured_target(config, "errors.not_found", NOT_FOUND_ACTION)?;
        let failure = configured_target(config, "errors.failure", FAILURE_ACTION)?;
        Ok(Self::new(failure)
            .with_route(ErrorCategory::HandlerNotFound, not_found.clone())
            .with_route(ErrorCategory::ActionNotFound, not_found))
    }

    /// Category-specific routes in evaluation order.
    #[must_use]
    pub fn routes(&self) -> &[(ErrorCategory, ForwardTarget)] {
        &self.routes
    }

    /// Catch-all target.
    #[must_use]
    pub const fn fallback(&self) -> &ForwardTarget {
        &self.fallback
    }

    /// Picks the target for `failure`.
    ///
    /// A specific route is returned as configured. The catch-all receives
    /// the parameters `[Null, Failure(original)]`.
    #[must_use]
    pub fn classify_and_route(&self, failure: &DispatchFailure) -> ForwardTarget {
        let category = failure.category();
        self.routes
            .iter()
            .find(|(routed, _)| *routed == category)
            .map_or_else(
                || {
                    self.fallback.clone().with_params(vec![
                        ForwardParam::Null,
                        ForwardParam::Failure(failure.clone()),
                    ])
                },
                |(_, target)| target.clone(),
            )
    }
}

fn configured_target(
    config: &ConfigNode,
    table: &str,
    default_action: &str,
) -> Result<ForwardTarget, ConfigValueError> {
    let key = |field: &str| format!("{table}.{field}");
    Ok(ForwardTarget::new(
        config.str_or(&key("namespace"), DEFAULT_ERROR_NAMESPACE)?,
        config.str_or(&key("handler"), DEFAULT_ERROR_HANDLER)?,
        config.str_or(&key("action"), default_action)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io;

    #[rstest]
    #[case(DispatchFailure::handler_not_found("users"))]
    #[case(DispatchFailure::action_not_found("users", "purge"))]
    fn not_found_failures_route_to_show404(#[case] failure: DispatchFailure) {
        let target = ErrorPolicy::default().classify_and_route(&failure);

        assert_eq!(target.to_string(), "Controllers/error/show404");
        assert!(target.params().is_empty());
    }

    #[rstest]
    fn other_failures_route_to_show500_with_the_original() {
        let failure = DispatchFailure::raised(io::Error::other("database unavailable"));

        let target = ErrorPolicy::default().classify_and_route(&failure);

        assert_eq!(target.to_string(), "Controllers/error/show500");
        assert!(matches!(target.params(), [ForwardParam::Null, ForwardParam::Failure(_)]));
        assert_eq!(
            target.failure().map(ToString::to_string).as_deref(),
            Some("database unavailable")
        );
    }

    #[rstest]
    fn policies_without_specific_routes_are_still_total() {
        let policy = ErrorPolicy::new(ForwardTarget::new("Controllers", "error", "oops"));

        let target = policy.classify_and_route(&DispatchFailure::handler_not_found("users"));

        assert_eq!(target.action(), "oops");
        assert!(policy.routes().is_empty());
    }

    #[rstest]
    fn configuration_overrides_individual_fields() {
        let config = ConfigNode::from_toml_str(
            "[errors.not_found]\naction = \"missing\"\n\n[errors.failure]\nnamespace = \"Admin\"\n",
        )
        .expect("valid toml");

        let policy = ErrorPolicy::from_config(&config).expect("policy");

        let not_found = policy.classify_and_route(&DispatchFailure::handler_not_found("users"));
        assert_eq!(not_found.to_string(), "Controllers/error/missing");
        assert_eq!(policy.fallback().to_string(), "Admin/error/show500");
    }

    #[rstest]
    fn mistyped_overrides_are_rejected() {
        let config = ConfigNode::from_toml_str("[errors.failure]\naction = 500\n").expect("toml");

        let error = ErrorPolicy::from_config(&config).expect_err("action must be a string");

        assert_eq!(
            error,
            ConfigValueError::WrongType {
                path: String::from("errors.failure.action"),
                expected: "a string",
            }
        );
    }
}
