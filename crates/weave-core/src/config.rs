use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::StoreOptions;
use crate::graph::{ReadinessMode, ReadinessPolicy};

/// Directory under a project root holding the config and default store.
pub const WEAVE_DIR: &str = ".weave";

/// Largest `store.deadline_ms` SQLite can take as a busy timeout.
pub const MAX_DEADLINE_MS: u64 = 2_147_483_647; // i32::MAX

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaveConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file. Relative paths resolve against the project root.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub readiness: ReadinessMode,
    #[serde(default)]
    pub require_resolved: bool,
    #[serde(default)]
    pub cross_project_dependencies: bool,
}

impl WeaveConfig {
    /// Store path with relative paths anchored at `project_root`.
    #[must_use]
    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            project_root.join(&self.store.path)
        }
    }

    #[must_use]
    pub const fn store_options(&self) -> StoreOptions {
        StoreOptions {
            deadline: Duration::from_millis(self.store.deadline_ms),
            cross_project_dependencies: self.graph.cross_project_dependencies,
        }
    }

    fn validated(self) -> Result<Self> {
        if self.store.deadline_ms > MAX_DEADLINE_MS {
            anyhow::bail!(
                "store.deadline_ms = {} exceeds the limit of {MAX_DEADLINE_MS}",
                self.store.deadline_ms
            );
        }
        Ok(self)
    }

    #[must_use]
    pub const fn readiness_policy(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            mode: self.graph.readiness,
            require_resolved: self.graph.require_resolved,
        }
    }
}

/// Load `<project_root>/.weave/config.toml`, falling back to the user config
/// (`<config_dir>/weave/config.toml`) and then to defaults.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<WeaveConfig> {
    let user_path = dirs::config_dir().map(|dir| dir.join("weave/config.toml"));
    load_config_from(&project_config_path(project_root), user_path.as_deref())
}

#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(WEAVE_DIR).join("config.toml")
}

fn load_config_from(project_path: &Path, user_path: Option<&Path>) -> Result<WeaveConfig> {
    for path in std::iter::once(project_path).chain(user_path) {
        if !path.exists() {
            continue;
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = toml::from_str::<WeaveConfig>(&content)
            .map_err(anyhow::Error::from)
            .and_then(|config| config.validated())
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        return Ok(config);
    }
    Ok(WeaveConfig::default())
}

fn default_store_path() -> PathBuf {
    Path::new(WEAVE_DIR).join("weave.sqlite3")
}

const fn default_deadline_ms() -> u64 {
    3000
}
