//! Layered configuration for Trellis applications.
//!
//! Configuration is read from two TOML sources, a base file shared by every
//! deployment and a local override, and deep-merged into a single read-only
//! [`ConfigNode`] tree. The merged tree is what service factories read when
//! the container is bootstrapped.

mod defaults;
mod loader;
mod logging;
mod node;

pub use defaults::{
    DEFAULT_CONFIG_PATH, DEFAULT_LOCAL_CONFIG_PATH, DEFAULT_LOG_FILTER, default_log_filter,
    default_log_format,
};
pub use loader::{ConfigError, ConfigLoadError, ConfigSources, load, read_source};
pub use logging::{LogFormat, LogFormatParseError, LoggingSettings};
pub use node::{ConfigMergeError, ConfigNode, ConfigValueError, NodeKind, Scalar};
