//! Stateless helpers and the per-use validator.

use std::sync::{Mutex, PoisonError};

use crate::container::{FactoryError, Lifetime, ServiceContainer};
use crate::initializers::InitializerError;

use super::{UTIL, VALIDATE};

/// Small text helpers shared by handlers and views.
#[derive(Debug, Default, Clone, Copy)]
pub struct Util;

impl Util {
    /// Lowercases `text` and joins its alphanumeric runs with `-`.
    #[must_use]
    pub fn slugify(&self, text: &str) -> String {
        text.split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Shortens `text` to at most `max_chars` characters, ending with `…`
    /// when anything was cut. A zero limit yields an empty string.
    #[must_use]
    pub fn truncate(&self, text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_owned();
        }
        if max_chars == 0 {
            return String::new();
        }
        let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", kept.trim_end())
    }
}

/// Collects validation messages for a single form or payload.
///
/// The `validate` service is transient, so every resolution starts with an
/// empty message buffer.
#[derive(Debug, Default)]
pub struct Validator {
    messages: Mutex<Vec<String>>,
}

impl Validator {
    /// Creates a validator with no messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message when `value` is blank.
    pub fn required(&self, field: &str, value: &str) -> &Self {
        if value.trim().is_empty() {
            self.push(format!("{field} is required"));
        }
        self
    }

    /// Records a message unless `value` looks like `local@domain.tld`.
    pub fn email(&self, field: &str, value: &str) -> &Self {
        let well_formed = value.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        });
        if !well_formed {
            self.push(format!("{field} must be a valid email address"));
        }
        self
    }

    /// Records a message when `value` is longer than `max_chars`.
    pub fn max_length(&self, field: &str, value: &str, max_chars: usize) -> &Self {
        if value.chars().count() > max_chars {
            self.push(format!("{field} must be at most {max_chars} characters"));
        }
        self
    }

    /// Returns `true` when no message has been recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lock().is_empty()
    }

    /// Messages recorded so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn push(&self, message: String) {
        self.lock().push(message);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registers the shared `util` service.
///
/// # Errors
///
/// Never fails; the signature matches the other initializers.
pub fn init_util(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(UTIL, Lifetime::Shared, |_| Ok::<_, FactoryError>(Util));
    Ok(())
}

/// Registers the transient `validate` service.
///
/// # Errors
///
/// Never fails; the signature matches the other initializers.
pub fn init_validate(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(VALIDATE, Lifetime::Transient, |_| {
        Ok::<_, FactoryError>(Validator::new())
    });
    Ok(())
}
