//! Test harness utilities for the bootstrap suites.

mod config_loader;
mod ordering;
mod reporter;
mod world;

pub use config_loader::{ConfigFiles, memory_cache_config};
pub use ordering::{ALPHA, BETA, ordering_table};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
