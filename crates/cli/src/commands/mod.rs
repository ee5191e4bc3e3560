//! CLI Commands

pub mod judge;
pub mod model_eval;
pub mod scenario;
pub mod transcript;

use std::path::Path;

use anyhow::{Context, Result};
use compare_qa_common::{Error, ProjectConfig};
use tracing::warn;

/// Load the project configuration; a missing file is an error
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    ProjectConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Load the project configuration, falling back to defaults when the file is absent
pub fn load_config_or_default(path: &Path) -> Result<ProjectConfig> {
    match ProjectConfig::load(path) {
        Ok(config) => Ok(config),
        Err(Error::ConfigNotFound(_)) => {
            warn!("{} not found, using defaults", path.display());
            Ok(ProjectConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("loading {}", path.display())),
    }
}
