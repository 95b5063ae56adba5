//! Config store for loading shipyard.toml and applying environment overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use super::{ShipyardConfig, parser, paths};

pub const ENV_DEPLOY_TOKEN: &str = "SHIPYARD_DEPLOY_TOKEN";
pub const ENV_BIND: &str = "SHIPYARD_BIND";
pub const ENV_STRATEGY: &str = "SHIPYARD_STRATEGY";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store for `path`, or the default location when `None`.
    pub fn new(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => paths::default_config_path()?,
        };
        Ok(Self::from_path(config_path))
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the file (defaults when absent) and apply process environment
    /// overrides.
    pub fn load(&self) -> anyhow::Result<ShipyardConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// [`Self::load`] with an explicit environment lookup.
    pub fn load_with_env(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<ShipyardConfig> {
        let mut config = if self.config_path.exists() {
            parser::parse_shipyard_toml(&self.config_path)?
        } else {
            debug!(path = %self.config_path.display(), "no config file, using defaults");
            ShipyardConfig::new()
        };

        apply_env_overrides(&mut config, lookup)?;
        config
            .validate()
            .context("Invalid configuration after environment overrides")?;
        Ok(config)
    }

    pub fn save(&self, config: &ShipyardConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}

fn apply_env_overrides(
    config: &mut ShipyardConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty(ENV_DEPLOY_TOKEN) {
        config.server.deploy_token = Some(token);
    }
    if let Some(bind) = non_empty(ENV_BIND) {
        config.server.bind = bind;
    }
    if let Some(strategy) = non_empty(ENV_STRATEGY) {
        config.deploy.strategy = strategy
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .with_context(|| format!("Invalid {ENV_STRATEGY}"))?;
    }
    Ok(())
}
