//! Hierarchical configuration tree and its deep-merge semantics.
//!
//! A [`ConfigNode`] is either a string-keyed map, an ordered sequence, or a
//! scalar leaf. Trees are produced by parsing a configuration source and are
//! combined with [`ConfigNode::merge`], which overlays one tree on another:
//! maps recurse key by key, every other node is replaced wholesale by the
//! overlay. Merging nodes of different kinds at the same path is rejected.

use std::collections::BTreeMap;
use std::fmt;

use strum::Display;
use thiserror::Error;

/// Leaf value stored in a configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// UTF-8 text. TOML datetimes are kept in their textual form.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean flag.
    Boolean(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => formatter.write_str(value),
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::Boolean(value) => write!(formatter, "{value}"),
        }
    }
}

/// Structural kind of a [`ConfigNode`], used when reporting merge conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    /// A string-keyed table.
    Map,
    /// An ordered list.
    Sequence,
    /// A leaf value.
    Scalar,
}

/// Read-only configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    /// Nested table keyed by name.
    Map(BTreeMap<String, ConfigNode>),
    /// Ordered list of nodes. Sequences merge as leaves.
    Sequence(Vec<ConfigNode>),
    /// Leaf value.
    Scalar(Scalar),
}

impl Default for ConfigNode {
    fn default() -> Self {
        Self::Map(BTreeMap::new())
    }
}

/// Raised when two trees cannot be merged because their shapes disagree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot merge {overlay} over {base} at '{path}'")]
pub struct ConfigMergeError {
    /// Dotted path of the conflicting node; `<root>` for the tree root.
    pub path: String,
    /// Kind found in the base tree.
    pub base: NodeKind,
    /// Kind found in the overriding tree.
    pub overlay: NodeKind,
}

/// Errors raised by the typed accessors on [`ConfigNode`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigValueError {
    /// No node exists at the requested path.
    #[error("missing configuration value '{path}'")]
    Missing {
        /// Dotted path that was requested.
        path: String,
    },
    /// A node exists but has the wrong type.
    #[error("configuration value '{path}' is not {expected}")]
    WrongType {
        /// Dotted path that was requested.
        path: String,
        /// Human-readable description of the expected type.
        expected: &'static str,
    },
    /// A node has the right type but an unsupported value.
    #[error("unsupported value '{value}' for configuration key '{path}'")]
    Invalid {
        /// Dotted path that was requested.
        path: String,
        /// Offending value.
        value: String,
    },
}

impl ConfigNode {
    /// Builds an empty map node.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a string leaf.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(value.into()))
    }

    /// Parses a TOML document into a tree.
    ///
    /// # Errors
    ///
    /// Returns the TOML parser error when `source` is not a valid document.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(source)?;
        Ok(Self::from(toml::Value::Table(table)))
    }

    /// Reports the structural kind of this node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Map(_) => NodeKind::Map,
            Self::Sequence(_) => NodeKind::Sequence,
            Self::Scalar(_) => NodeKind::Scalar,
        }
    }

    /// Overlays `overlay` on top of `self`, returning the merged tree.
    ///
    /// Leaf values and sequences in `overlay` replace those in `self`; maps
    /// are merged key by key; keys absent from `overlay` are retained.
    /// Applying the same overlay twice yields the same tree as applying it
    /// once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigMergeError`] when the two trees hold nodes of
    /// different kinds at the same path.
    pub fn merge(&self, overlay: &Self) -> Result<Self, ConfigMergeError> {
        let mut path = Vec::new();
        merge_at(self, overlay, &mut path)
    }

    /// Looks up a descendant by dotted path, such as `cache.adapter`.
    ///
    /// An empty path returns the node itself.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Self> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |node, key| match node {
            Self::Map(entries) => entries.get(key),
            Self::Sequence(_) | Self::Scalar(_) => None,
        })
    }

    /// Returns `true` when a node exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Returns the string value of a leaf.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the integer value of a leaf.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the boolean value of a leaf.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the entries of a map node.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the items of a sequence node.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Reads a required string at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when the value is missing or not a string.
    pub fn str_at(&self, path: &str) -> Result<&str, ConfigValueError> {
        self.typed_at(path, "a string", Self::as_str)
    }

    /// Reads a required integer at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when the value is missing or not an
    /// integer.
    pub fn integer_at(&self, path: &str) -> Result<i64, ConfigValueError> {
        self.typed_at(path, "an integer", Self::as_integer)
    }

    /// Reads a required boolean at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError`] when the value is missing or not a
    /// boolean.
    pub fn bool_at(&self, path: &str) -> Result<bool, ConfigValueError> {
        self.typed_at(path, "a boolean", Self::as_bool)
    }

    /// Reads an optional string at `path`, falling back to `default` when
    /// the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError::WrongType`] when the key exists but is not
    /// a string.
    pub fn str_or<'a>(&'a self, path: &str, default: &'a str) -> Result<&'a str, ConfigValueError> {
        if self.contains(path) {
            self.str_at(path)
        } else {
            Ok(default)
        }
    }

    /// Reads an optional boolean at `path`, falling back to `default`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError::WrongType`] when the key exists but is not
    /// a boolean.
    pub fn bool_or(&self, path: &str, default: bool) -> Result<bool, ConfigValueError> {
        if self.contains(path) {
            self.bool_at(path)
        } else {
            Ok(default)
        }
    }

    /// Reads an optional integer at `path`, falling back to `default`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValueError::WrongType`] when the key exists but is not
    /// an integer.
    pub fn integer_or(&self, path: &str, default: i64) -> Result<i64, ConfigValueError> {
        if self.contains(path) {
            self.integer_at(path)
        } else {
            Ok(default)
        }
    }

    fn typed_at<'a, T>(
        &'a self,
        path: &str,
        expected: &'static str,
        extract: impl FnOnce(&'a Self) -> Option<T>,
    ) -> Result<T, ConfigValueError> {
        let node = self.get(path).ok_or_else(|| ConfigValueError::Missing {
            path: path.to_owned(),
        })?;
        extract(node).ok_or_else(|| ConfigValueError::WrongType {
            path: path.to_owned(),
            expected,
        })
    }
}

fn merge_at(
    base: &ConfigNode,
    overlay: &ConfigNode,
    path: &mut Vec<String>,
) -> Result<ConfigNode, ConfigMergeError> {
    match (base, overlay) {
        (ConfigNode::Map(base_entries), ConfigNode::Map(overlay_entries)) => {
            let mut merged = base_entries.clone();
            for (key, value) in overlay_entries {
                let next = match base_entries.get(key) {
                    Some(existing) => {
                        path.push(key.clone());
                        let result = merge_at(existing, value, path);
                        path.pop();
                        result?
                    }
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Ok(ConfigNode::Map(merged))
        }
        (ConfigNode::Sequence(_), ConfigNode::Sequence(_))
        | (ConfigNode::Scalar(_), ConfigNode::Scalar(_)) => Ok(overlay.clone()),
        _ => Err(ConfigMergeError {
            path: display_path(path),
            base: base.kind(),
            overlay: overlay.kind(),
        }),
    }
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        String::from("<root>")
    } else {
        path.join(".")
    }
}

impl From<toml::Value> for ConfigNode {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(text) => Self::Scalar(Scalar::String(text)),
            toml::Value::Integer(number) => Self::Scalar(Scalar::Integer(number)),
            toml::Value::Float(number) => Self::Scalar(Scalar::Float(number)),
            toml::Value::Boolean(flag) => Self::Scalar(Scalar::Boolean(flag)),
            toml::Value::Datetime(datetime) => Self::Scalar(Scalar::String(datetime.to_string())),
            toml::Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            toml::Value::Table(table) => Self::Map(
                table
                    .into_iter()
                    .map(|(key, entry)| (key, Self::from(entry)))
                    .collect(),
            ),
        }
    }
}

impl From<Scalar> for ConfigNode {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}
