//! Key/value cache service over in-memory or file storage.
//!
//! Every entry carries an expiry computed from the cache lifetime when it is
//! written. Expired entries read as absent and are removed on access.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use trellis_config::{ConfigNode, ConfigValueError};

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::CACHE;

/// Lifetime applied when `cache.lifetime` is not configured.
pub const DEFAULT_CACHE_LIFETIME_SECS: u64 = 3600;

/// Errors raised by cache stores.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Keys must be non-empty and use only ASCII letters, digits, `-`, `_`,
    /// `.` and `:`, without a leading `.`.
    #[error("invalid cache key '{key}'")]
    InvalidKey {
        /// Rejected key.
        key: String,
    },
    /// Reading or writing a cache file failed.
    #[error("cache I/O failed for '{path}': {source}")]
    Io {
        /// File that was accessed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A cache file did not start with an expiry line.
    #[error("corrupt cache entry at '{path}'")]
    Corrupt {
        /// Offending file.
        path: Utf8PathBuf,
    },
}

/// Storage backend used by [`Cache`].
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Reads `key`, returning `None` when absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Writes `value` under `key`, expiring after `lifetime`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend cannot be written.
    fn set(&self, key: &str, value: &str, lifetime: Duration) -> Result<(), CacheError>;

    /// Removes `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend cannot be written.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Process-local store.
///
/// An entry whose expiry does not fit in an [`Instant`] never expires.
/// Writes sweep entries that have already expired.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_live(expires: Option<Instant>, now: Instant) -> bool {
    expires.is_none_or(|at| at > now)
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some((value, expires)) = entries.get(key) else {
            return Ok(None);
        };
        if !is_live(*expires, Instant::now()) {
            entries.remove(key);
            return Ok(None);
        }
        Ok(Some(value.clone()))
    }

    fn set(&self, key: &str, value: &str, lifetime: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (_, expires)| is_live(*expires, now));
        entries.insert(key.to_owned(), (value.to_owned(), now.checked_add(lifetime)));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}

/// Store writing one file per key under a directory.
///
/// Each file holds the expiry as milliseconds since the Unix epoch on its
/// first line, followed by the value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: Utf8PathBuf,
}

impl FileStore {
    /// Builds a store rooted at `dir`; the directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding cache files.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(key)
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let Some((expires, value)) = contents
            .split_once('\n')
            .and_then(|(expires, value)| Some((expires.parse::<u128>().ok()?, value)))
        else {
            return Err(CacheError::Corrupt { path });
        };
        if expires <= unix_millis() {
            self.delete(key)?;
            return Ok(None);
        }
        Ok(Some(value.to_owned()))
    }

    fn set(&self, key: &str, value: &str, lifetime: Duration) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path(key);
        let expires = unix_millis().saturating_add(lifetime.as_millis());
        fs::write(&path, format!("{expires}\n{value}"))
            .map_err(|source| CacheError::Io { path, source })
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

/// Backend selected by `cache.adapter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAdapter {
    /// [`MemoryStore`].
    Memory,
    /// [`FileStore`] rooted at `dir`.
    File {
        /// Cache directory.
        dir: Utf8PathBuf,
    },
}

/// Cache configuration read from `[cache]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    adapter: CacheAdapter,
    prefix: String,
    lifetime: Duration,
}

impl CacheSettings {
    /// Reads `cache.adapter` (`file` by default, or `memory`), `cache.dir`
    /// (default `cache` under `paths.app_root`), `cache.prefix` and
    /// `cache.lifetime` in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError::Invalid`] for an unknown adapter or a
    /// negative lifetime, and other variants for mistyped keys.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        let adapter = match config.str_or("cache.adapter", "file")? {
            "memory" => CacheAdapter::Memory,
            "file" => CacheAdapter::File {
                dir: match config.get("cache.dir") {
                    Some(_) => Utf8PathBuf::from(config.str_at("cache.dir")?),
                    None => Utf8Path::new(config.str_or("paths.app_root", ".")?).join("cache"),
                },
            },
            other => {
                return Err(ConfigValueError::Invalid {
                    path: String::from("cache.adapter"),
                    value: other.to_owned(),
                });
            }
        };

        let default_lifetime = i64::try_from(DEFAULT_CACHE_LIFETIME_SECS).unwrap_or(i64::MAX);
        let seconds = config.integer_or("cache.lifetime", default_lifetime)?;
        let lifetime = u64::try_from(seconds)
            .map(Duration::from_secs)
            .map_err(|_| ConfigValueError::Invalid {
                path: String::from("cache.lifetime"),
                value: seconds.to_string(),
            })?;

        Ok(Self {
            adapter,
            prefix: config.str_or("cache.prefix", "")?.to_owned(),
            lifetime,
        })
    }

    /// Selected backend.
    #[must_use]
    pub const fn adapter(&self) -> &CacheAdapter {
        &self.adapter
    }

    /// Prefix prepended to every key.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Default entry lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

/// Prefixing front end over a [`CacheStore`].
#[derive(Debug)]
pub struct Cache {
    store: Box<dyn CacheStore>,
    prefix: String,
    lifetime: Duration,
}

impl Cache {
    /// Wraps `store`.
    #[must_use]
    pub fn new(
        store: impl CacheStore + 'static,
        prefix: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        Self {
            store: Box::new(store),
            prefix: prefix.into(),
            lifetime,
        }
    }

    /// Builds the store described by `settings`.
    #[must_use]
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let (prefix, lifetime) = (settings.prefix(), settings.lifetime());
        match settings.adapter() {
            CacheAdapter::Memory => Self::new(MemoryStore::new(), prefix, lifetime),
            CacheAdapter::File { dir } => Self::new(FileStore::new(dir.clone()), prefix, lifetime),
        }
    }

    /// Default entry lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Reads `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] for an invalid key or a failing store.
    pub fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.store.get(&self.key(key)?)
    }

    /// Writes `value` under `key` with the default lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] for an invalid key or a failing store.
    pub fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.set_for(key, value, self.lifetime)
    }

    /// Writes `value` under `key`, expiring after `lifetime`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] for an invalid key or a failing store.
    pub fn set_for(&self, key: &str, value: &str, lifetime: Duration) -> Result<(), CacheError> {
        self.store.set(&self.key(key)?, value, lifetime)
    }

    /// Removes `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] for an invalid key or a failing store.
    pub fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.store.delete(&self.key(key)?)
    }

    fn key(&self, key: &str) -> Result<String, CacheError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':'));
        if valid {
            Ok(format!("{}{key}", self.prefix))
        } else {
            Err(CacheError::InvalidKey {
                key: key.to_owned(),
            })
        }
    }
}

struct CacheFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for CacheFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        let settings = CacheSettings::from_config(&self.config)?;
        Ok(instance(Cache::from_settings(&settings)))
    }
}

/// Registers the shared `cache` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_cache(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    container.register(CACHE, CacheFactory { config }, Lifetime::Shared);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerError;
    use crate::services::test_support::container_with_config;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn cache_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("cache")).expect("utf8 temp dir");
        (dir, path)
    }

    #[rstest]
    fn memory_entries_round_trip_until_expiry() {
        let cache = Cache::new(MemoryStore::new(), "app:", Duration::from_secs(60));

        cache.set("greeting", "hello").expect("set");
        cache
            .set_for("stale", "old", Duration::ZERO)
            .expect("set stale");

        assert_eq!(cache.get("greeting").expect("get").as_deref(), Some("hello"));
        assert_eq!(cache.get("stale").expect("get stale"), None);
        assert!(cache.delete("greeting").expect("delete"));
        assert!(!cache.delete("greeting").expect("delete again"));
    }

    #[rstest]
    fn oversized_lifetimes_never_expire() {
        let container = container_with_config(
            "[cache]\nadapter = \"memory\"\nlifetime = 9223372036854775807\n",
        );
        init_cache(&container).expect("registration succeeds");
        let cache = container.resolve_as::<Cache>(CACHE).expect("resolve cache");

        cache.set("k", "v").expect("set");

        assert_eq!(cache.lifetime().as_secs(), 9_223_372_036_854_775_807);
        assert_eq!(cache.get("k").expect("get").as_deref(), Some("v"));
    }

    #[rstest]
    fn writes_sweep_expired_entries() {
        let store = MemoryStore::new();
        store.set("first", "a", Duration::ZERO).expect("set first");
        store.set("second", "b", Duration::ZERO).expect("set second");

        store.set("live", "c", Duration::from_secs(60)).expect("set live");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("live").expect("get").as_deref(), Some("c"));
    }

    #[rstest]
    fn file_entries_are_written_with_the_prefix(cache_dir: (TempDir, Utf8PathBuf)) {
        let (_guard, dir) = cache_dir;
        let cache = Cache::new(FileStore::new(dir.clone()), "app_", Duration::from_secs(60));

        cache.set("users.count", "42").expect("set");

        assert!(dir.join("app_users.count").is_file());
        assert_eq!(cache.get("users.count").expect("get").as_deref(), Some("42"));
        assert_eq!(cache.get("missing").expect("get missing"), None);
    }

    #[rstest]
    fn expired_files_are_removed_on_read(cache_dir: (TempDir, Utf8PathBuf)) {
        let (_guard, dir) = cache_dir;
        let cache = Cache::new(FileStore::new(dir.clone()), "", Duration::from_secs(60));

        cache.set_for("report", "stale", Duration::ZERO).expect("set");

        assert_eq!(cache.get("report").expect("get"), None);
        assert!(!dir.join("report").exists());
    }

    #[rstest]
    fn corrupt_files_are_reported(cache_dir: (TempDir, Utf8PathBuf)) {
        let (_guard, dir) = cache_dir;
        fs::create_dir_all(&dir).expect("create cache dir");
        fs::write(dir.join("broken"), "not-a-timestamp").expect("write corrupt entry");
        let cache = Cache::new(FileStore::new(dir), "", Duration::from_secs(60));

        let error = cache.get("broken").expect_err("entry is corrupt");

        assert!(matches!(error, CacheError::Corrupt { .. }));
    }

    #[rstest]
    #[case("")]
    #[case("../etc/passwd")]
    #[case(".hidden")]
    #[case("with space")]
    fn unsafe_keys_are_rejected(#[case] key: &str) {
        let cache = Cache::new(MemoryStore::new(), "", Duration::from_secs(60));

        let error = cache.set(key, "value").expect_err("key should be rejected");

        assert!(matches!(error, CacheError::InvalidKey { .. }));
    }

    #[rstest]
    fn settings_default_to_an_hour() {
        let config = ConfigNode::from_toml_str("[cache]\nadapter = \"memory\"\n").expect("toml");

        let settings = CacheSettings::from_config(&config).expect("settings");

        assert_eq!(settings.adapter(), &CacheAdapter::Memory);
        assert_eq!(settings.lifetime(), Duration::from_secs(DEFAULT_CACHE_LIFETIME_SECS));
        assert_eq!(settings.prefix(), "");
    }

    #[rstest]
    #[case("[cache]\nadapter = \"redis\"\n")]
    #[case("[cache]\nadapter = \"memory\"\nlifetime = -5\n")]
    fn invalid_settings_fail_at_resolution(#[case] source: &str) {
        let container = container_with_config(source);
        init_cache(&container).expect("registration succeeds");

        let error = container.resolve(CACHE).expect_err("settings are invalid");

        assert!(matches!(error, ContainerError::Init { ref name, .. } if name == "cache"));
    }

    #[rstest]
    fn cache_service_is_shared() {
        let container = container_with_config("[cache]\nadapter = \"memory\"\n");
        init_cache(&container).expect("registration succeeds");

        let writer = container.resolve_as::<Cache>(CACHE).expect("resolve cache");
        writer.set("token", "abc").expect("set");
        let reader = container.resolve_as::<Cache>(CACHE).expect("resolve cache");

        assert!(Arc::ptr_eq(&writer, &reader));
        assert_eq!(reader.get("token").expect("get").as_deref(), Some("abc"));
    }
}
