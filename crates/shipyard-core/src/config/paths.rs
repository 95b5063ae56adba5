//! Config path resolution helpers.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "shipyard.toml";

/// `<config dir>/shipyard/shipyard.toml`
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let global_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("shipyard");
    Ok(config_path_in(&global_dir))
}

pub fn config_path_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}
