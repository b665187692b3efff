//! Logical namespace registration.
//!
//! Maps the application's logical namespaces to the directories holding
//! their code. The registry is built before any service initializer runs and
//! is published in the container as the `loader` service.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use trellis_config::{ConfigNode, ConfigValueError};

/// Namespaces registered when the configuration does not list its own.
pub const DEFAULT_NAMESPACES: &[(&str, &str)] = &[
    ("Actions", "actions"),
    ("Base", "base"),
    ("Controllers", "controllers"),
    ("Db", "models"),
    ("Lib", "library"),
];

/// Namespace to directory mapping rooted at the application directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRegistry {
    root: Utf8PathBuf,
    namespaces: BTreeMap<String, Utf8PathBuf>,
}

impl NamespaceRegistry {
    /// Builds a registry holding [`DEFAULT_NAMESPACES`] under `root`.
    #[must_use]
    pub fn with_defaults(root: impl Into<Utf8PathBuf>) -> Self {
        let mut registry = Self::empty(root);
        for (namespace, directory) in DEFAULT_NAMESPACES {
            registry.register(*namespace, *directory);
        }
        registry
    }

    /// Builds a registry with no namespaces.
    #[must_use]
    pub fn empty(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespaces: BTreeMap::new(),
        }
    }

    /// Reads `paths.app_root` and the optional `[namespaces]` table.
    ///
    /// Relative directories are resolved against the application root. When
    /// `[namespaces]` is absent the defaults are registered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when `paths.app_root` is not a string,
    /// `namespaces` is not a table, or one of its entries is not a string.
    pub fn from_config(config: &ConfigNode) -> Result<Self, ConfigValueError> {
        let root = config.str_or("paths.app_root", ".")?;
        let Some(table) = config.get("namespaces") else {
            return Ok(Self::with_defaults(root));
        };
        let entries = table.as_map().ok_or_else(|| ConfigValueError::WrongType {
            path: String::from("namespaces"),
            expected: "a table",
        })?;

        let mut registry = Self::empty(root);
        for (namespace, directory) in entries {
            let directory = directory.as_str().ok_or_else(|| ConfigValueError::WrongType {
                path: format!("namespaces.{namespace}"),
                expected: "a string",
            })?;
            registry.register(namespace.as_str(), directory);
        }
        Ok(registry)
    }

    /// Registers `namespace`, replacing any previous directory.
    pub fn register(&mut self, namespace: impl Into<String>, directory: impl AsRef<Utf8Path>) {
        let directory = directory.as_ref();
        let resolved = if directory.is_absolute() {
            directory.to_path_buf()
        } else {
            self.root.join(directory)
        };
        self.namespaces.insert(namespace.into(), resolved);
    }

    /// Application root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        self.root.as_path()
    }

    /// Directory registered for `namespace`.
    #[must_use]
    pub fn directory(&self, namespace: &str) -> Option<&Utf8Path> {
        self.namespaces.get(namespace).map(Utf8PathBuf::as_path)
    }

    /// Locates the directory for a `::`-qualified name such as
    /// `Controllers::admin::Users`; the first segment selects the namespace
    /// and the remaining module segments become subdirectories.
    #[must_use]
    pub fn locate(&self, qualified: &str) -> Option<Utf8PathBuf> {
        let mut segments = qualified.split("::");
        let namespace = segments.next()?;
        let mut path = self.directory(namespace)?.to_path_buf();
        let rest: Vec<&str> = segments.collect();
        if let Some((_, modules)) = rest.split_last() {
            for module in modules {
                path.push(module);
            }
        }
        Some(path)
    }

    /// Registered namespaces in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Utf8Path)> {
        self.namespaces
            .iter()
            .map(|(namespace, directory)| (namespace.as_str(), directory.as_path()))
    }
}
