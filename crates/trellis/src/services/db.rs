//! Database descriptor and query profiler services.
//!
//! The `db` initializer resolves `profiler` while it runs, so `profiler`
//! must appear earlier in the bootstrap list.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;
use trellis_config::{ConfigNode, ConfigValueError};

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::{DB, PROFILER};

const PROFILER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::profiler");

/// Timing of one completed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProfile {
    statement: String,
    elapsed: Duration,
}

impl QueryProfile {
    /// Profiled statement text.
    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Time between start and stop.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[derive(Debug, Default)]
struct ProfilerState {
    active: Option<(String, Instant)>,
    completed: Vec<QueryProfile>,
}

/// Records statement timings.
#[derive(Debug, Default)]
pub struct QueryProfiler {
    state: Mutex<ProfilerState>,
}

impl QueryProfiler {
    /// Creates an empty profiler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing `statement`, discarding any profile left running.
    pub fn start_profile(&self, statement: impl Into<String>) {
        self.lock().active = Some((statement.into(), Instant::now()));
    }

    /// Stops the running profile and records it.
    ///
    /// Returns `None` when no profile was started.
    pub fn stop_profile(&self) -> Option<QueryProfile> {
        let mut state = self.lock();
        let (statement, started) = state.active.take()?;
        let profile = QueryProfile {
            statement,
            elapsed: started.elapsed(),
        };
        debug!(
            target: PROFILER_TARGET,
            statement = %profile.statement,
            elapsed_us = profile.elapsed.as_micros(),
            "query profiled"
        );
        state.completed.push(profile.clone());
        Some(profile)
    }

    /// Completed profiles in the order they finished.
    #[must_use]
    pub fn profiles(&self) -> Vec<QueryProfile> {
        self.lock().completed.clone()
    }

    /// Sum of all recorded timings.
    #[must_use]
    pub fn total_elapsed(&self) -> Duration {
        self.lock().completed.iter().map(QueryProfile::elapsed).sum()
    }

    /// Discards recorded and running profiles.
    pub fn reset(&self) {
        *self.lock() = ProfilerState::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProfilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connection parameters read from `[database]`.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    host: String,
    username: String,
    password: String,
    dbname: String,
    persistent: bool,
}

impl DatabaseSettings {
    /// Reads `database.host`, `database.username` and `database.dbname`
    /// (required), plus `database.password` and `database.persistent`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when a required key is missing or any key
    /// has the wrong type.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        Ok(Self {
            host: config.str_at("database.host")?.to_owned(),
            username: config.str_at("database.username")?.to_owned(),
            password: config.str_or("database.password", "")?.to_owned(),
            dbname: config.str_at("database.dbname")?.to_owned(),
            persistent: config.bool_or("database.persistent", false)?,
        })
    }

    /// Database host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Login user.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Database name.
    #[must_use]
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// Whether connections are kept open between requests.
    #[must_use]
    pub const fn persistent(&self) -> bool {
        self.persistent
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("persistent", &self.persistent)
            .finish()
    }
}

/// Database descriptor handed to the model layer.
#[derive(Debug)]
pub struct DatabaseHandle {
    settings: DatabaseSettings,
    profiler: Option<Arc<QueryProfiler>>,
}

impl DatabaseHandle {
    /// Connection parameters.
    #[must_use]
    pub const fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Profiler attached when `profiling.query` is enabled.
    #[must_use]
    pub fn profiler(&self) -> Option<&QueryProfiler> {
        self.profiler.as_deref()
    }

    /// Runs `query` for `statement`, timing it when profiling is enabled.
    pub fn execute<T>(&self, statement: &str, query: impl FnOnce() -> T) -> T {
        let Some(profiler) = self.profiler.as_deref() else {
            return query();
        };
        profiler.start_profile(statement);
        let result = query();
        profiler.stop_profile();
        result
    }
}

struct DatabaseFactory {
    config: Arc<ConfigNode>,
    profiler: Arc<QueryProfiler>,
}

impl ServiceFactory for DatabaseFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        let settings = DatabaseSettings::from_config(&self.config)?;
        let profiler = self
            .config
            .bool_or("profiling.query", false)?
            .then(|| Arc::clone(&self.profiler));
        Ok(instance(DatabaseHandle { settings, profiler }))
    }
}

/// Registers the shared `profiler` service.
///
/// # Errors
///
/// Never fails; the signature matches the other initializers.
pub fn init_profiler(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(PROFILER, Lifetime::Shared, |_| {
        Ok::<_, FactoryError>(QueryProfiler::new())
    });
    Ok(())
}

/// Registers the shared `db` service.
///
/// Resolves `profiler` immediately, constructing it if needed.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` or `profiler` cannot
/// be resolved.
pub fn init_db(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    let profiler = container.resolve_as::<QueryProfiler>(PROFILER)?;
    container.register(DB, DatabaseFactory { config, profiler }, Lifetime::Shared);
    Ok(())
}
