//! Logging settings read from the `[logging]` table of the merged tree.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::defaults::{DEFAULT_LOG_FILTER, default_log_format};
use crate::node::{ConfigNode, ConfigValueError};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    filter: String,
    format: LogFormat,
}

impl LoggingSettings {
    /// Builds settings from explicit values.
    #[must_use]
    pub fn new(filter: impl Into<String>, format: LogFormat) -> Self {
        Self {
            filter: filter.into(),
            format,
        }
    }

    /// Reads `logging.filter` and `logging.format`, applying defaults for
    /// absent keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when a key has the wrong type or names an
    /// unknown format.
    pub fn from_node(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        let filter = config.str_or("logging.filter", DEFAULT_LOG_FILTER)?;
        let format = match config.get("logging.format") {
            None => default_log_format(),
            Some(_) => {
                let raw = config.str_at("logging.format")?;
                raw.parse::<LogFormat>()
                    .map_err(|_| ConfigValueError::Invalid {
                        path: String::from("logging.format"),
                        value: raw.to_owned(),
                    })?
            }
        };
        Ok(Self::new(filter, format))
    }

    /// Filter expression in `tracing_subscriber::EnvFilter` syntax.
    #[must_use]
    pub fn filter(&self) -> &str {
        self.filter.as_str()
    }

    /// Output format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_FILTER, default_log_format())
    }
}
