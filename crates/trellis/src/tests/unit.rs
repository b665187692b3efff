//! Unit tests for the bootstrap sequence.

use std::sync::Arc;

use rstest::{fixture, rstest};
use tracing::subscriber::NoSubscriber;

use trellis_config::{ConfigError, ConfigNode};

use crate::bootstrap::{
    Bootstrap, BootstrapError, CONFIG_SERVICE, LOADER_SERVICE, StaticConfigLoader,
};
use crate::container::ContainerError;
use crate::namespaces::NamespaceRegistry;
use crate::services::{CACHE, Cache, DB, PROFILER, UTIL, Util};
use crate::slot::ContainerSlot;

use super::support::{
    ALPHA, BETA, ConfigFiles, HealthEvent, RecordingHealthReporter, memory_cache_config,
    ordering_table,
};

struct Harness {
    loader: StaticConfigLoader,
    slot: ContainerSlot,
    reporter: Arc<RecordingHealthReporter>,
}

impl Harness {
    fn run(&self, services: &[&str]) -> Result<Arc<crate::ServiceContainer>, BootstrapError> {
        Bootstrap::new(&self.loader, &self.slot)
            .with_reporter(self.reporter.clone())
            .with_initializers(ordering_table())
            .run(services)
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        loader: StaticConfigLoader::new(memory_cache_config()),
        slot: ContainerSlot::new(),
        reporter: Arc::new(RecordingHealthReporter::default()),
    }
}

#[rstest]
fn empty_service_list_registers_config_and_loader(harness: Harness) {
    let container = harness.run(&[]).expect("bootstrap should succeed");

    assert_eq!(container.names(), vec![CONFIG_SERVICE, LOADER_SERVICE]);
    let loader = container
        .resolve_as::<NamespaceRegistry>(LOADER_SERVICE)
        .expect("resolve loader");
    assert_eq!(
        loader.directory("Lib").map(|dir| dir.as_str()),
        Some("/srv/app/library")
    );
    let published = harness.slot.current().expect("published container");
    assert!(Arc::ptr_eq(&published, &container));
}

#[rstest]
fn util_and_cache_are_registered_without_construction(harness: Harness) {
    let container = harness
        .run(&[UTIL, CACHE])
        .expect("bootstrap should succeed");

    assert_eq!(
        container.names(),
        vec![CACHE, CONFIG_SERVICE, LOADER_SERVICE, UTIL]
    );
    assert!(!container.is_instantiated(CACHE));
    assert!(!container.is_instantiated(UTIL));

    let cache = container.resolve_as::<Cache>(CACHE).expect("resolve cache");
    cache.set("visits", "1").expect("write cache");
    let again = container.resolve_as::<Cache>(CACHE).expect("resolve cache");
    assert!(Arc::ptr_eq(&cache, &again));
    assert_eq!(again.get("visits").expect("read cache").as_deref(), Some("1"));
    assert_eq!(
        container
            .resolve_as::<Util>(UTIL)
            .expect("resolve util")
            .slugify("Hello World"),
        "hello-world"
    );
    assert!(matches!(
        container.resolve(DB),
        Err(ContainerError::NotFound { ref name }) if name == DB
    ));
}

#[rstest]
fn lifecycle_events_follow_the_requested_order(harness: Harness) {
    harness
        .run(&[UTIL, CACHE])
        .expect("bootstrap should succeed");

    assert_eq!(
        harness.reporter.events(),
        vec![
            HealthEvent::BootstrapStarting,
            HealthEvent::ServiceInitialising(UTIL.to_owned()),
            HealthEvent::ServiceRegistered(UTIL.to_owned()),
            HealthEvent::ServiceInitialising(CACHE.to_owned()),
            HealthEvent::ServiceRegistered(CACHE.to_owned()),
            HealthEvent::BootstrapSucceeded(vec![
                CACHE.to_owned(),
                CONFIG_SERVICE.to_owned(),
                LOADER_SERVICE.to_owned(),
                UTIL.to_owned(),
            ]),
        ]
    );
}

#[rstest]
fn eager_dependencies_must_be_listed_first(harness: Harness) {
    let container = harness
        .run(&[ALPHA, "eager_beta"])
        .expect("alpha before eager beta succeeds");
    assert_eq!(
        container
            .resolve_as::<String>(BETA)
            .expect("resolve beta")
            .as_str(),
        "beta after alpha"
    );

    harness.slot.clear();
    let error = harness
        .run(&["eager_beta", ALPHA])
        .expect_err("eager beta before alpha fails");

    assert!(matches!(
        error.container_error(),
        Some(ContainerError::NotFound { name }) if name == ALPHA
    ));
    assert!(!harness.slot.is_published());
}

#[rstest]
#[case::dependency_listed_later(&["lazy_beta", ALPHA])]
#[case::dependency_listed_first(&[ALPHA, "lazy_beta"])]
fn lazy_dependencies_are_order_insensitive(harness: Harness, #[case] services: &[&str]) {
    let container = harness.run(services).expect("bootstrap should succeed");

    assert!(!container.is_instantiated(ALPHA));
    let beta = container.resolve_as::<String>(BETA).expect("resolve beta");

    assert_eq!(beta.as_str(), "beta after alpha");
    assert!(container.is_instantiated(ALPHA));
}

#[rstest]
fn lazy_dependencies_that_never_register_fail_at_resolution(harness: Harness) {
    let container = harness.run(&["lazy_beta"]).expect("bootstrap should succeed");

    let error = container.resolve(BETA).expect_err("alpha is missing");

    assert!(matches!(error, ContainerError::Init { ref name, .. } if name == BETA));
}

#[rstest]
#[case::profiler_first(&[PROFILER, DB], true)]
#[case::profiler_last(&[DB, PROFILER], false)]
fn db_needs_the_profiler_first(
    harness: Harness,
    #[case] services: &[&str],
    #[case] succeeds: bool,
) {
    let result = harness.run(services);

    assert_eq!(result.is_ok(), succeeds);
    assert_eq!(harness.slot.is_published(), succeeds);
}

#[rstest]
fn unknown_services_abort_before_publishing(harness: Harness) {
    let error = harness
        .run(&[UTIL, "mailer"])
        .expect_err("mailer has no initializer");

    assert!(matches!(error, BootstrapError::UnknownService { ref name } if name == "mailer"));
    assert!(!harness.slot.is_published());
    let events = harness.reporter.events();
    assert_eq!(
        events.last(),
        Some(&HealthEvent::BootstrapFailed(String::from(
            "no initializer registered for service 'mailer'"
        )))
    );
}

#[rstest]
fn failed_bootstraps_keep_the_previous_container(harness: Harness) {
    let first = harness.run(&[UTIL]).expect("first bootstrap");

    harness
        .run(&["eager_beta"])
        .expect_err("second bootstrap fails");

    let current = harness.slot.current().expect("previous container");
    assert!(Arc::ptr_eq(&first, &current));
}

#[rstest]
fn invalid_logging_settings_abort_bootstrap() {
    let loader = StaticConfigLoader::new(
        ConfigNode::from_toml_str("[logging]\nformat = \"yaml\"\n").expect("valid toml"),
    );
    let slot = ContainerSlot::new();

    let error = Bootstrap::new(&loader, &slot)
        .run(&[UTIL])
        .expect_err("format is invalid");

    assert!(matches!(error, BootstrapError::Logging { .. }));
    assert!(!slot.is_published());
}

#[rstest]
fn bootstrap_runs_under_a_host_subscriber() {
    let _ = tracing::subscriber::set_global_default(NoSubscriber::default());
    let loader = StaticConfigLoader::new(ConfigNode::empty());
    let slot = ContainerSlot::new();

    let container = Bootstrap::new(&loader, &slot)
        .run(&[UTIL])
        .expect("bootstrap should succeed");

    assert!(container.contains(UTIL));
    assert!(slot.is_published());
}

#[rstest]
fn layered_files_are_merged_before_initializers_run() {
    let files = ConfigFiles::new(
        "[cache]\nadapter = \"file\"\nlifetime = 60\n\n[paths]\napp_root = \"/srv/app\"\n",
        "[cache]\nadapter = \"memory\"\n",
    );
    let loader = files.loader();
    let slot = ContainerSlot::new();

    let container = Bootstrap::new(&loader, &slot)
        .run(&[CACHE])
        .expect("bootstrap should succeed");

    let config = container
        .resolve_as::<ConfigNode>(CONFIG_SERVICE)
        .expect("resolve config");
    assert_eq!(config.str_at("cache.adapter"), Ok("memory"));
    assert_eq!(config.integer_at("cache.lifetime"), Ok(60));
    let cache = container.resolve_as::<Cache>(CACHE).expect("resolve cache");
    assert_eq!(cache.lifetime().as_secs(), 60);
}

#[rstest]
fn missing_local_override_is_a_configuration_error() {
    let files = ConfigFiles::new("[cache]\nadapter = \"memory\"\n", "");
    let loader = files.loader_missing_local();
    let slot = ContainerSlot::new();

    let error = Bootstrap::new(&loader, &slot)
        .run(&[UTIL])
        .expect_err("local override is missing");

    assert!(matches!(
        error,
        BootstrapError::Configuration {
            source: ConfigError::Load(_)
        }
    ));
    assert!(!slot.is_published());
}

#[rstest]
fn conflicting_layers_are_a_configuration_error() {
    let files = ConfigFiles::new("[cache]\nadapter = \"memory\"\n", "cache = \"off\"\n");
    let loader = files.loader();
    let slot = ContainerSlot::new();

    let error = Bootstrap::new(&loader, &slot)
        .run(&[UTIL])
        .expect_err("cache changes kind");

    match error {
        BootstrapError::Configuration {
            source: ConfigError::Merge(merge),
        } => assert_eq!(merge.path, "cache"),
        other => panic!("unexpected error: {other:?}"),
    }
}
