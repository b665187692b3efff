//! Named service registry with lazy, lifetime-aware resolution.
//!
//! Each entry maps a service name to either a ready-made instance or a
//! [`ServiceFactory`]. Factories are never invoked at registration time; a
//! [`Lifetime::Shared`] entry runs its factory on first resolution and caches
//! the result for the rest of the entry's life, while a
//! [`Lifetime::Transient`] entry runs its factory on every resolution.
//!
//! Re-registering a name replaces the entry and therefore resets its cache.
//! Instances already handed out stay alive with whoever holds them.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use strum::Display;
use thiserror::Error;
use tracing::debug;

/// Tracing target for container operations.
pub(crate) const CONTAINER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::container");

/// Type-erased service instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Error type returned by service factories.
pub type FactoryError = Box<dyn Error + Send + Sync>;

/// Wraps a concrete value as a service [`Instance`].
pub fn instance<T>(value: T) -> Instance
where
    T: Any + Send + Sync,
{
    Arc::new(value)
}

/// Caching policy for a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Lifetime {
    /// One instance per entry, built on first resolution.
    Shared,
    /// A fresh instance on every resolution.
    Transient,
}

/// Produces service instances on demand.
///
/// Implementations are records holding whatever the service needs (settings
/// read from configuration, other services resolved at registration time).
/// The container is passed in so a factory may also resolve collaborators
/// lazily, at the moment it runs.
pub trait ServiceFactory: Send + Sync {
    /// Builds a new instance of the service.
    fn create(&self, container: &ServiceContainer) -> Result<Instance, FactoryError>;
}

struct FnFactory<F, T> {
    factory: F,
    _produces: PhantomData<fn() -> T>,
}

impl<F, T> ServiceFactory for FnFactory<F, T>
where
    F: Fn(&ServiceContainer) -> Result<T, FactoryError> + Send + Sync,
    T: Any + Send + Sync,
{
    fn create(&self, container: &ServiceContainer) -> Result<Instance, FactoryError> {
        (self.factory)(container).map(instance)
    }
}

/// Errors surfaced while resolving services.
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// No entry exists for the requested name.
    #[error("service '{name}' is not registered")]
    NotFound {
        /// Requested service name.
        name: String,
    },
    /// The factory for the service failed.
    #[error("service '{name}' failed to initialise: {source}")]
    Init {
        /// Service whose factory failed.
        name: String,
        /// Error reported by the factory.
        #[source]
        source: Arc<dyn Error + Send + Sync>,
    },
    /// The instance is not of the requested type.
    #[error("service '{name}' is not a {expected}")]
    TypeMismatch {
        /// Requested service name.
        name: String,
        /// Type the caller asked for.
        expected: &'static str,
    },
    /// No container has been published to the slot that was queried.
    #[error("no default container has been published")]
    NoDefault,
}

impl ContainerError {
    /// Builds a not-found error for `name`.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    fn init(name: &str, source: FactoryError) -> Self {
        Self::Init {
            name: name.to_owned(),
            source: Arc::from(source),
        }
    }
}

enum EntrySource {
    Instance(Instance),
    Factory(Box<dyn ServiceFactory>),
}

struct ServiceEntry {
    source: EntrySource,
    lifetime: Lifetime,
    cached: OnceCell<Instance>,
}

impl ServiceEntry {
    fn resolve(&self, name: &str, container: &ServiceContainer) -> Result<Instance, ContainerError> {
        let factory = match &self.source {
            EntrySource::Instance(value) => return Ok(Arc::clone(value)),
            EntrySource::Factory(factory) => factory,
        };

        match self.lifetime {
            Lifetime::Shared => self
                .cached
                .get_or_try_init(|| {
                    debug!(target: CONTAINER_TARGET, service = name, "constructing shared service");
                    factory.create(container)
                })
                .map(Arc::clone)
                .map_err(|source| ContainerError::init(name, source)),
            Lifetime::Transient => factory
                .create(container)
                .map_err(|source| ContainerError::init(name, source)),
        }
    }

    fn is_instantiated(&self) -> bool {
        match self.source {
            EntrySource::Instance(_) => true,
            EntrySource::Factory(_) => self.cached.get().is_some(),
        }
    }
}

/// Registry mapping service names to instances and factories.
///
/// The container is `Send + Sync`. Entries are swapped under a lock that is
/// released before any factory runs, so factories may resolve or register
/// other services. The first resolution of a shared entry is guarded by a
/// once-cell: concurrent callers block until the single factory invocation
/// finishes and then observe the same instance.
#[derive(Default)]
pub struct ServiceContainer {
    entries: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

impl ServiceContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`, replacing any existing entry.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: impl ServiceFactory + 'static,
        lifetime: Lifetime,
    ) {
        self.insert(name.into(), EntrySource::Factory(Box::new(factory)), lifetime);
    }

    /// Registers a closure factory under `name`.
    pub fn register_fn<F, T>(&self, name: impl Into<String>, lifetime: Lifetime, factory: F)
    where
        F: Fn(&Self) -> Result<T, FactoryError> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        let factory = FnFactory {
            factory,
            _produces: PhantomData,
        };
        self.register(name, factory, lifetime);
    }

    /// Registers a ready-made value under `name`; resolution always returns it.
    pub fn register_instance<T>(&self, name: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.register_shared_instance(name, instance(value));
    }

    /// Registers an already type-erased instance under `name`.
    pub fn register_shared_instance(&self, name: impl Into<String>, value: Instance) {
        self.insert(name.into(), EntrySource::Instance(value), Lifetime::Shared);
    }

    fn insert(&self, name: String, source: EntrySource, lifetime: Lifetime) {
        debug!(target: CONTAINER_TARGET, service = %name, %lifetime, "registering service");
        let entry = Arc::new(ServiceEntry {
            source,
            lifetime,
            cached: OnceCell::new(),
        });
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, entry);
    }

    fn entry(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Resolves `name` to an instance.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] when `name` is not registered and
    /// [`ContainerError::Init`] when its factory fails.
    pub fn resolve(&self, name: &str) -> Result<Instance, ContainerError> {
        let entry = self.entry(name).ok_or_else(|| ContainerError::not_found(name))?;
        entry.resolve(name, self)
    }

    /// Resolves `name` and downcasts the instance to `T`.
    ///
    /// # Errors
    ///
    /// As [`ServiceContainer::resolve`], plus [`ContainerError::TypeMismatch`]
    /// when the instance is not a `T`.
    pub fn resolve_as<T>(&self, name: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        self.resolve(name)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_owned(),
                expected: type_name::<T>(),
            })
    }

    /// Returns `true` when an entry exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Returns the lifetime registered for `name`.
    #[must_use]
    pub fn lifetime(&self, name: &str) -> Option<Lifetime> {
        self.entry(name).map(|entry| entry.lifetime)
    }

    /// Returns `true` when `name` currently holds a built instance: either a
    /// registered value or a shared entry that has been resolved.
    #[must_use]
    pub fn is_instantiated(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|entry| entry.is_instantiated())
    }

    /// Registered service names in ascending order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceContainer")
            .field("services", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Debug)]
    struct Connection {
        serial: usize,
    }

    #[derive(Clone, Default)]
    struct CountingFactory {
        built: Arc<AtomicUsize>,
    }

    impl CountingFactory {
        fn built(&self) -> usize {
            self.built.load(Ordering::SeqCst)
        }
    }

    impl ServiceFactory for CountingFactory {
        fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
            let serial = self.built.fetch_add(1, Ordering::SeqCst);
            Ok(instance(Connection { serial }))
        }
    }

    #[fixture]
    fn container() -> ServiceContainer {
        ServiceContainer::new()
    }

    #[rstest]
    fn registration_does_not_invoke_the_factory(container: ServiceContainer) {
        let factory = CountingFactory::default();
        container.register("db", factory.clone(), Lifetime::Shared);

        assert_eq!(factory.built(), 0);
        assert!(!container.is_instantiated("db"));
    }

    #[rstest]
    fn shared_entries_build_once_and_return_the_same_instance(container: ServiceContainer) {
        let factory = CountingFactory::default();
        container.register("db", factory.clone(), Lifetime::Shared);

        let first = container.resolve("db").expect("resolve db");
        let second = container.resolve("db").expect("resolve db");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.built(), 1);
        assert!(container.is_instantiated("db"));
    }

    #[rstest]
    fn transient_entries_build_on_every_resolution(container: ServiceContainer) {
        let factory = CountingFactory::default();
        container.register("validate", factory.clone(), Lifetime::Transient);

        let first = container
            .resolve_as::<Connection>("validate")
            .expect("resolve validate");
        let second = container
            .resolve_as::<Connection>("validate")
            .expect("resolve validate");

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!((first.serial, second.serial), (0, 1));
        assert_eq!(factory.built(), 2);
    }

    #[rstest]
    fn resolving_one_service_does_not_build_another(container: ServiceContainer) {
        let db = CountingFactory::default();
        let cache = CountingFactory::default();
        container.register("db", db.clone(), Lifetime::Shared);
        container.register("cache", cache.clone(), Lifetime::Shared);

        container.resolve("db").expect("resolve db");

        assert_eq!(db.built(), 1);
        assert_eq!(cache.built(), 0);
        assert!(!container.is_instantiated("cache"));
    }

    #[rstest]
    #[case::empty_container(&[])]
    #[case::other_names(&["db", "cache"])]
    fn unregistered_names_are_not_found(container: ServiceContainer, #[case] registered: &[&str]) {
        for name in registered {
            container.register_instance(*name, 1_u8);
        }

        let error = container.resolve("session").expect_err("should not resolve");

        assert!(matches!(error, ContainerError::NotFound { ref name } if name == "session"));
    }

    #[rstest]
    fn instances_are_returned_verbatim(container: ServiceContainer) {
        let value = instance(String::from("ready"));
        container.register_shared_instance("greeting", Arc::clone(&value));

        let resolved = container.resolve("greeting").expect("resolve greeting");

        assert!(Arc::ptr_eq(&value, &resolved));
        assert!(container.is_instantiated("greeting"));
    }

    #[rstest]
    fn factory_failures_carry_the_service_name(container: ServiceContainer) {
        container.register_fn("mongo", Lifetime::Shared, |_| -> Result<(), FactoryError> {
            Err("connection refused".into())
        });

        let error = container.resolve("mongo").expect_err("factory should fail");

        match error {
            ContainerError::Init { name, source } => {
                assert_eq!(name, "mongo");
                assert_eq!(source.to_string(), "connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!container.is_instantiated("mongo"));
    }

    #[rstest]
    fn failed_shared_factories_are_retried(container: ServiceContainer) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        container.register_fn("flaky", Lifetime::Shared, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FactoryError::from("first attempt fails"))
            } else {
                Ok(42_u32)
            }
        });

        assert!(container.resolve("flaky").is_err());
        let value = container.resolve_as::<u32>("flaky").expect("second attempt");

        assert_eq!(*value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    fn typed_resolution_rejects_other_types(container: ServiceContainer) {
        container.register_instance("util", String::from("util"));

        let error = container
            .resolve_as::<u64>("util")
            .expect_err("type should mismatch");

        assert!(matches!(error, ContainerError::TypeMismatch { expected: "u64", .. }));
    }

    #[rstest]
    fn reregistering_resets_the_cache_but_not_existing_holders(container: ServiceContainer) {
        let first_factory = CountingFactory::default();
        container.register("db", first_factory.clone(), Lifetime::Shared);
        let held = container.resolve_as::<Connection>("db").expect("resolve db");

        let second_factory = CountingFactory {
            built: Arc::new(AtomicUsize::new(10)),
        };
        container.register("db", second_factory.clone(), Lifetime::Shared);
        let fresh = container.resolve_as::<Connection>("db").expect("resolve db");

        assert_eq!(held.serial, 0);
        assert_eq!(fresh.serial, 10);
        assert_eq!(first_factory.built(), 1);
        assert_eq!(second_factory.built(), 11);
    }

    #[rstest]
    fn factories_may_resolve_collaborators_lazily(container: ServiceContainer) {
        container.register_fn("dispatcher", Lifetime::Shared, |services| {
            let name = services.resolve_as::<String>("namespace")?;
            Ok(format!("dispatching into {name}"))
        });
        container.register_instance("namespace", String::from("Controllers"));

        let dispatcher = container
            .resolve_as::<String>("dispatcher")
            .expect("resolve dispatcher");

        assert_eq!(dispatcher.as_str(), "dispatching into Controllers");
    }

    #[rstest]
    fn concurrent_first_resolution_builds_once(container: ServiceContainer) {
        let factory = CountingFactory::default();
        container.register("db", factory.clone(), Lifetime::Shared);
        let container = Arc::new(container);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = Arc::clone(&container);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    container.resolve("db").expect("resolve db")
                })
            })
            .collect();
        let instances: Vec<Instance> = handles
            .into_iter()
            .map(|handle| handle.join().expect("resolver thread panicked"))
            .collect();

        assert_eq!(factory.built(), 1);
        let first = instances.first().expect("at least one instance");
        assert!(instances.iter().all(|other| Arc::ptr_eq(first, other)));
    }

    #[rstest]
    fn names_are_sorted(container: ServiceContainer) {
        container.register_instance("view", ());
        container.register_instance("cache", ());
        container.register_instance("router", ());

        assert_eq!(container.names(), vec!["cache", "router", "view"]);
        assert_eq!(container.len(), 3);
        assert_eq!(container.lifetime("cache"), Some(Lifetime::Shared));
        assert!(!container.is_empty());
    }
}
