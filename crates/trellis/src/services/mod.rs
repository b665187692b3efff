//! Built-in service initializers.
//!
//! Each initializer registers one named entry whose factory is a small record
//! holding the merged configuration and any collaborators resolved up front.
//! Settings are read when the factory runs, so a misconfigured service only
//! fails once something resolves it.

mod auth;
mod behaviors;
mod cache;
mod data_cache;
mod db;
mod documents;
mod router;
mod session;
mod util;
mod web;

use std::sync::Arc;

use trellis_config::ConfigNode;

use crate::bootstrap::CONFIG_SERVICE;
use crate::container::{ContainerError, ServiceContainer};

pub use auth::{Auth, Identity, init_auth};
pub use behaviors::{ModelEvent, TimestampBehavior, init_behaviors};
pub use cache::{
    Cache, CacheAdapter, CacheError, CacheSettings, CacheStore, DEFAULT_CACHE_LIFETIME_SECS,
    FileStore, MemoryStore, init_cache,
};
pub use data_cache::{DataCache, DataCacheBackend, init_data_cache};
pub use db::{
    DatabaseHandle, DatabaseSettings, QueryProfile, QueryProfiler, init_db, init_profiler,
};
pub use documents::{CollectionManager, DocumentDatabase, init_collection_manager, init_mongo};
pub use router::{RouteSpec, RouteTable, init_router};
pub use session::{SessionAdapter, SessionSettings, init_session};
pub use util::{Util, Validator, init_util, init_validate};
pub use web::{CookieSettings, UrlResolver, ViewSettings, init_cookies, init_url, init_view};

/// Route table service.
pub const ROUTER: &str = "router";
/// View settings service.
pub const VIEW: &str = "view";
/// URL resolver service.
pub const URL: &str = "url";
/// Cookie settings service.
pub const COOKIES: &str = "cookies";
/// Session settings service.
pub const SESSION: &str = "session";
/// Query profiler service.
pub const PROFILER: &str = "profiler";
/// Database handle service.
pub const DB: &str = "db";
/// Key/value cache service.
pub const CACHE: &str = "cache";
/// Stateless helper service.
pub const UTIL: &str = "util";
/// Per-use validator service.
pub const VALIDATE: &str = "validate";
/// Document database service.
pub const MONGO: &str = "mongo";
/// Collection bookkeeping service.
pub const COLLECTION_MANAGER: &str = "collection_manager";
/// Bootstrap name that registers the model behaviors.
pub const BEHAVIORS: &str = "behaviors";
/// Per-model timestamp behavior service.
pub const BEHAVIOR_TIMESTAMP: &str = "behavior_timestamp";
/// Model data cache service.
pub const DATA_CACHE: &str = "data_cache";
/// Signed-in identity service.
pub const AUTH: &str = "auth";

/// Resolves the merged configuration registered by the bootstrap sequence.
pub(crate) fn config(container: &ServiceContainer) -> Result<Arc<ConfigNode>, ContainerError> {
    container.resolve_as::<ConfigNode>(CONFIG_SERVICE)
}
