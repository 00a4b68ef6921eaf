pub mod add;
pub mod check;
pub mod create;
pub mod delete;
pub mod init;
pub mod link;
pub mod plan;
pub mod show;
pub mod status;

use anyhow::Result;
use std::path::{Path, PathBuf};

use weave_core::config::{self, WeaveConfig};
use weave_core::{ErrorCode, WorkflowService};

use crate::output::Failure;

/// Where a command runs and which store it talks to.
#[derive(Debug, Clone)]
pub struct Context {
    pub project_root: PathBuf,
    pub db_override: Option<PathBuf>,
}

impl Context {
    /// Load the effective config with any `--db` override applied. Parse
    /// failures are reported as `ConfigParseError` rather than as
    /// unexpected errors.
    pub fn config(&self) -> Result<WeaveConfig> {
        let mut config = config::load_config(&self.project_root).map_err(|err| {
            anyhow::Error::new(Failure::new(ErrorCode::ConfigParseError, format!("{err:#}")))
        })?;
        if let Some(path) = &self.db_override {
            config.store.path.clone_from(path);
        }
        Ok(config)
    }

    /// Open the workflow service over an existing store.
    ///
    /// Only `wv init` creates a store; every other command fails with
    /// `NotInitialized` when the file is missing.
    pub fn service(&self) -> Result<WorkflowService> {
        let config = self.config()?;
        let path = config.store_path(&self.project_root);
        if !path.exists() {
            return Err(Failure::new(
                ErrorCode::NotInitialized,
                format!("no workflow store at {}", display_relative(&path, &self.project_root)),
            )
            .into());
        }
        WorkflowService::open(&config, &self.project_root)
    }
}

/// Render `path` relative to `root` when it lives underneath it.
pub fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
