//! Route table built from the `[[routes]]` array.

use std::sync::Arc;

use trellis_config::{ConfigNode, ConfigValueError};

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::ROUTER;

const DEFAULT_NAMESPACE: &str = "Controllers";

/// One route: a path pattern and the handler it dispatches to.
///
/// Segments starting with `:` match any single non-empty path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pattern: String,
    namespace: String,
    handler_group: String,
    action: String,
}

impl RouteSpec {
    /// Builds a route.
    #[must_use]
    pub fn new(
        pattern: impl Into<String>,
        namespace: impl Into<String>,
        handler_group: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            namespace: namespace.into(),
            handler_group: handler_group.into(),
            action: action.into(),
        }
    }

    /// Path pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Namespace holding the handler group.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Handler group name.
    #[must_use]
    pub fn handler_group(&self) -> &str {
        &self.handler_group
    }

    /// Action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns `true` when `path` matches this route's pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let expected: Vec<&str> = self.pattern.trim_matches('/').split('/').collect();
        let actual: Vec<&str> = path.trim_matches('/').split('/').collect();
        expected.len() == actual.len()
            && expected.iter().zip(&actual).all(|(pattern, segment)| {
                if pattern.starts_with(':') {
                    !segment.is_empty()
                } else {
                    pattern == segment
                }
            })
    }
}

/// Ordered list of routes; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    default_namespace: String,
    routes: Vec<RouteSpec>,
}

impl RouteTable {
    /// Reads `router.default_namespace` and the `[[routes]]` array.
    ///
    /// Each route needs `pattern`, `handler` and `action`; `namespace`
    /// falls back to the table's default namespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when `routes` is not an array of tables or
    /// a route is missing a field.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        let default_namespace = config
            .str_or("router.default_namespace", DEFAULT_NAMESPACE)?
            .to_owned();
        let Some(node) = config.get("routes") else {
            return Ok(Self {
                default_namespace,
                routes: Vec::new(),
            });
        };
        let items = node.as_sequence().ok_or_else(|| ConfigValueError::WrongType {
            path: String::from("routes"),
            expected: "an array of tables",
        })?;

        let routes = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let namespace = match item.get("namespace") {
                    Some(_) => route_field(item, index, "namespace")?,
                    None => default_namespace.as_str(),
                };
                Ok(RouteSpec::new(
                    route_field(item, index, "pattern")?,
                    namespace,
                    route_field(item, index, "handler")?,
                    route_field(item, index, "action")?,
                ))
            })
            .collect::<Result<Vec<_>, ConfigValueError>>()?;

        Ok(Self {
            default_namespace,
            routes,
        })
    }

    /// Namespace used by routes that do not name one.
    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Routes in declaration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    /// First route matching `path`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&RouteSpec> {
        self.routes.iter().find(|route| route.matches(path))
    }
}

fn route_field<'a>(
    item: &'a ConfigNode,
    index: usize,
    key: &str,
) -> Result<&'a str, ConfigValueError> {
    let path = format!("routes.{index}.{key}");
    match item.get(key) {
        None => Err(ConfigValueError::Missing { path }),
        Some(node) => node.as_str().ok_or(ConfigValueError::WrongType {
            path,
            expected: "a string",
        }),
    }
}

struct RouterFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for RouterFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        Ok(instance(RouteTable::from_config(&self.config)?))
    }
}

/// Registers the shared `router` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_router(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    container.register(ROUTER, RouterFactory { config }, Lifetime::Shared);
    Ok(())
}
