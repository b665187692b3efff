//! Data cache shared by models.
//!
//! The backend follows the session store: Redis-backed sessions put the data
//! cache on Redis too, anything else uses files under `cache.dir`. Entries
//! always live for [`DEFAULT_CACHE_LIFETIME_SECS`].

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use trellis_config::{ConfigNode, ConfigValueError};

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::DATA_CACHE;
use super::cache::{Cache, DEFAULT_CACHE_LIFETIME_SECS, FileStore};

/// Where data cache entries are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataCacheBackend {
    /// Redis server from `redis.cache.host` and `redis.cache.port`.
    Redis {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
    },
    /// One file per entry.
    File {
        /// Cache directory.
        dir: Utf8PathBuf,
        /// Prefix prepended to every key.
        prefix: String,
    },
}

impl DataCacheBackend {
    /// Picks the backend from `session.adapter`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when the Redis address is missing or
    /// mistyped, or the port is out of range.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        if config.str_or("session.adapter", "files")? == "redis" {
            let port = config.integer_at("redis.cache.port")?;
            return Ok(Self::Redis {
                host: config.str_at("redis.cache.host")?.to_owned(),
                port: u16::try_from(port).map_err(|_| ConfigValueError::Invalid {
                    path: String::from("redis.cache.port"),
                    value: port.to_string(),
                })?,
            });
        }

        let dir = match config.get("cache.dir") {
            Some(_) => Utf8PathBuf::from(config.str_at("cache.dir")?),
            None => Utf8Path::new(config.str_or("paths.app_root", ".")?).join("cache"),
        };
        Ok(Self::File {
            dir,
            prefix: config.str_or("cache.prefix", "")?.to_owned(),
        })
    }
}

/// The `data_cache` service.
///
/// The Redis backend is a connection descriptor; only the file backend
/// carries a usable [`Cache`].
#[derive(Debug)]
pub struct DataCache {
    backend: DataCacheBackend,
    local: Option<Cache>,
}

impl DataCache {
    /// Builds the cache described by `backend`.
    #[must_use]
    pub fn new(backend: DataCacheBackend) -> Self {
        let local = match &backend {
            DataCacheBackend::File { dir, prefix } => Some(Cache::new(
                FileStore::new(dir.clone()),
                prefix.as_str(),
                Self::lifetime(),
            )),
            DataCacheBackend::Redis { .. } => None,
        };
        Self { backend, local }
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn lifetime() -> Duration {
        Duration::from_secs(DEFAULT_CACHE_LIFETIME_SECS)
    }

    /// Selected backend.
    #[must_use]
    pub const fn backend(&self) -> &DataCacheBackend {
        &self.backend
    }

    /// File-backed cache, when the file backend is selected.
    #[must_use]
    pub const fn local(&self) -> Option<&Cache> {
        self.local.as_ref()
    }
}

struct DataCacheFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for DataCacheFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        let backend = DataCacheBackend::from_config(&self.config)?;
        Ok(instance(DataCache::new(backend)))
    }
}

/// Registers the shared `data_cache` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_data_cache(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    container.register(DATA_CACHE, DataCacheFactory { config }, Lifetime::Shared);
    Ok(())
}
