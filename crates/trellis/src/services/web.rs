//! View, URL and cookie services.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use trellis_config::{ConfigNode, ConfigValueError};

use crate::container::{
    FactoryError, Instance, Lifetime, ServiceContainer, ServiceFactory, instance,
};
use crate::initializers::InitializerError;

use super::{COOKIES, URL, VIEW};

/// Location of view templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    views_dir: Utf8PathBuf,
}

impl ViewSettings {
    /// Reads `paths.views`, defaulting to `views` under `paths.app_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when either path is not a string.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        let views_dir = match config.get("paths.views") {
            Some(_) => Utf8PathBuf::from(config.str_at("paths.views")?),
            None => Utf8Path::new(config.str_or("paths.app_root", ".")?).join("views"),
        };
        Ok(Self { views_dir })
    }

    /// Directory holding view templates.
    #[must_use]
    pub fn views_dir(&self) -> &Utf8Path {
        &self.views_dir
    }
}

/// Builds application and static asset URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    base_uri: String,
    static_base_uri: String,
}

impl UrlResolver {
    /// Builds a resolver over explicit base URIs.
    #[must_use]
    pub fn new(base_uri: impl Into<String>, static_base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            static_base_uri: static_base_uri.into(),
        }
    }

    /// Reads the required `paths.base_uri` and `paths.asset_uri` keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when either key is missing or not a
    /// string.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        Ok(Self::new(
            config.str_at("paths.base_uri")?,
            config.str_at("paths.asset_uri")?,
        ))
    }

    /// Base URI for application routes.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Base URI for static assets.
    #[must_use]
    pub fn static_base_uri(&self) -> &str {
        &self.static_base_uri
    }

    /// URL for an application path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        join_uri(&self.base_uri, path)
    }

    /// URL for a static asset.
    #[must_use]
    pub fn static_for(&self, path: &str) -> String {
        join_uri(&self.static_base_uri, path)
    }
}

fn join_uri(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Response cookie behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookieSettings {
    encryption: bool,
}

impl CookieSettings {
    /// Whether cookie values are encrypted. Always `false` for the built-in
    /// service.
    #[must_use]
    pub const fn encryption(&self) -> bool {
        self.encryption
    }
}

struct ViewFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for ViewFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        Ok(instance(ViewSettings::from_config(&self.config)?))
    }
}

struct UrlFactory {
    config: Arc<ConfigNode>,
}

impl ServiceFactory for UrlFactory {
    fn create(&self, _container: &ServiceContainer) -> Result<Instance, FactoryError> {
        Ok(instance(UrlResolver::from_config(&self.config)?))
    }
}

/// Registers the shared `view` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_view(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    container.register(VIEW, ViewFactory { config }, Lifetime::Shared);
    Ok(())
}

/// Registers the shared `url` service.
///
/// # Errors
///
/// Returns [`InitializerError::Container`] when `config` is not registered.
pub fn init_url(container: &ServiceContainer) -> Result<(), InitializerError> {
    let config = super::config(container)?;
    container.register(URL, UrlFactory { config }, Lifetime::Shared);
    Ok(())
}

/// Registers the shared `cookies` service.
///
/// # Errors
///
/// Never fails; the signature matches the other initializers.
pub fn init_cookies(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(COOKIES, Lifetime::Shared, |_| {
        Ok::<_, FactoryError>(CookieSettings::default())
    });
    Ok(())
}
