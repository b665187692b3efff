use crate::logging::LogFormat;

/// Default location of the base configuration source.
pub const DEFAULT_CONFIG_PATH: &str = "etc/config.toml";

/// Default location of the local override source.
pub const DEFAULT_LOCAL_CONFIG_PATH: &str = "etc/config.local.toml";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
