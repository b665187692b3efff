//! Configuration sources used by the bootstrap suites.

use std::fs;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use trellis_config::{ConfigNode, ConfigSources};

use crate::bootstrap::LayeredConfigLoader;

/// Configuration selecting the in-memory cache.
#[must_use]
pub fn memory_cache_config() -> ConfigNode {
    ConfigNode::from_toml_str(
        r#"
[paths]
app_root = "/srv/app"

[cache]
adapter = "memory"
prefix = "test:"
"#,
    )
    .expect("valid toml")
}

/// Base and local TOML files written under a temporary directory.
pub struct ConfigFiles {
    dir: TempDir,
}

impl ConfigFiles {
    /// Writes both sources.
    #[must_use]
    pub fn new(base: &str, local: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("config.toml"), base).expect("write base config");
        fs::write(dir.path().join("config.local.toml"), local).expect("write local config");
        Self { dir }
    }

    /// Path of a file inside the temporary directory.
    #[must_use]
    pub fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name)).expect("utf8 temp path")
    }

    /// Loader over the written sources.
    #[must_use]
    pub fn loader(&self) -> LayeredConfigLoader {
        LayeredConfigLoader::new(ConfigSources::new(
            self.path("config.toml"),
            self.path("config.local.toml"),
        ))
    }

    /// Loader whose local override does not exist.
    #[must_use]
    pub fn loader_missing_local(&self) -> LayeredConfigLoader {
        LayeredConfigLoader::new(ConfigSources::new(
            self.path("config.toml"),
            self.path("absent.toml"),
        ))
    }
}
