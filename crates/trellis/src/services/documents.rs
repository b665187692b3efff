//! Document store descriptor and collection bookkeeping.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use trellis_config::ConfigNode;

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::{COLLECTION_MANAGER, MONGO};

/// Document database selected by `mongodb.dbname`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDatabase {
    dbname: String,
}

impl DocumentDatabase {
    /// Database name.
    #[must_use]
    pub fn dbname(&self) -> &str {
        &self.dbname
    }
}

struct MongoFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for MongoFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        let dbname = self.config.str_at("mongodb.dbname")?.to_owned();
        Ok(instance(DocumentDatabase { dbname }))
    }
}

/// Tracks which connection service each document collection uses.
///
/// Collections without an explicit assignment use the `mongo` service.
#[derive(Debug, Default)]
pub struct CollectionManager {
    connections: Mutex<BTreeMap<String, String>>,
}

impl CollectionManager {
    /// Creates a manager with no assignments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `collection` through the connection registered as `service`.
    pub fn set_connection_service(&self, collection: impl Into<String>, service: impl Into<String>) {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.into(), service.into());
    }

    /// Connection service used by `collection`.
    #[must_use]
    pub fn connection_service(&self, collection: &str) -> String {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
            .unwrap_or_else(|| MONGO.to_owned())
    }
}

/// Registers the shared `mongo` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_mongo(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    container.register(MONGO, MongoFactory { config }, Lifetime::Shared);
    Ok(())
}

/// Registers the shared `collection_manager` service.
///
/// # Errors
///
/// Never fails; the signature matches the other initializers.
pub fn init_collection_manager(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(COLLECTION_MANAGER, Lifetime::Shared, |_| {
        Ok::<_, FactoryError>(CollectionManager::new())
    });
    Ok(())
}
