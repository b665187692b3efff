//! Session storage settings.

use std::sync::Arc;

use trellis_config::{ConfigNode, ConfigValueError};

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::SESSION;

/// Where session data is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAdapter {
    /// Files on local disk.
    Files,
    /// A Redis server reached through `uri`.
    Redis {
        /// Connection URI, such as `tcp://127.0.0.1:6379?weight=1&prefix=sess_`.
        uri: String,
    },
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    adapter: SessionAdapter,
    name: Option<String>,
    lifetime: Option<i64>,
    cookie_lifetime: Option<i64>,
}

impl SessionSettings {
    /// Reads the `[session]` table.
    ///
    /// `session.adapter` defaults to `files`. The `redis` adapter also reads
    /// `redis.session.host`, `redis.session.port` and
    /// `redis.session.prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError::Invalid`] for an unknown adapter and other
    /// [`ConfigValueError`] variants for missing or mistyped keys.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        let adapter = match config.str_or("session.adapter", "files")? {
            "files" => SessionAdapter::Files,
            "redis" => SessionAdapter::Redis {
                uri: format!(
                    "tcp://{}:{}?weight=1&prefix={}",
                    config.str_at("redis.session.host")?,
                    config.integer_at("redis.session.port")?,
                    config.str_or("redis.session.prefix", "")?,
                ),
            },
            other => {
                return Err(ConfigValueError::Invalid {
                    path: String::from("session.adapter"),
                    value: other.to_owned(),
                });
            }
        };

        Ok(Self {
            adapter,
            name: optional_str(config, "session.name")?,
            lifetime: optional_integer(config, "session.lifetime")?,
            cookie_lifetime: optional_integer(config, "session.cookie_lifetime")?,
        })
    }

    /// Storage adapter.
    #[must_use]
    pub const fn adapter(&self) -> &SessionAdapter {
        &self.adapter
    }

    /// Session cookie name, if configured.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Session lifetime in seconds, if configured.
    #[must_use]
    pub const fn lifetime(&self) -> Option<i64> {
        self.lifetime
    }

    /// Session cookie lifetime in seconds, if configured.
    #[must_use]
    pub const fn cookie_lifetime(&self) -> Option<i64> {
        self.cookie_lifetime
    }
}

fn optional_str(config: &ConfigNode, path: &str) -> Result<Option<String>, ConfigValueError> {
    config
        .get(path)
        .map(|_| config.str_at(path).map(str::to_owned))
        .transpose()
}

fn optional_integer(config: &ConfigNode, path: &str) -> Result<Option<i64>, ConfigValueError> {
    config
        .get(path)
        .map(|_| config.integer_at(path))
        .transpose()
}

struct SessionFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for SessionFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        Ok(instance(SessionSettings::from_config(&self.config)?))
    }
}

/// Registers the shared `session` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_session(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    container.register(SESSION, SessionFactory { config }, Lifetime::Shared);
    Ok(())
}
