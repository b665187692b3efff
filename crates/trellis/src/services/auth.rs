//! Signed-in identity holder.

use std::sync::{PoisonError, RwLock};

use crate::container::{FactoryError, Lifetime, ServiceContainer};
use crate::initializers::InitializerError;

use super::AUTH;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: u64,
    name: String,
}

impl Identity {
    /// Builds an identity.
    #[must_use]
    pub fn new(user_id: u64, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
        }
    }

    /// Numeric user id.
    #[must_use]
    pub const fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Tracks who is signed in.
#[derive(Debug, Default)]
pub struct Auth {
    current: RwLock<Option<Identity>>,
}

impl Auth {
    /// Creates a holder with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signs `identity` in, returning whoever was signed in before.
    pub fn sign_in(&self, identity: Identity) -> Option<Identity> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(identity)
    }

    /// Signs the current identity out.
    pub fn sign_out(&self) -> Option<Identity> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Signed-in identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` when someone is signed in.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Registers the shared `auth` service.
///
/// # Errors
///
/// Never fails; the signature matches the other initializers.
pub fn init_auth(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(AUTH, Lifetime::Shared, |_| Ok::<_, FactoryError>(Auth::new()));
    Ok(())
}
