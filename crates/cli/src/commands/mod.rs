//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::SimulationBlueprint;

use crate::error::CliError;

pub use info::run_info;
pub use run::run_simulation;
pub use validate::run_validate;

/// Load and validate a blueprint, failing early on a missing file
fn load_blueprint(path: &Path) -> Result<SimulationBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
