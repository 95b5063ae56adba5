//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::build::BuildExecutor;
use crate::config::{ConfigStore, ShipyardConfig};
use crate::deploy::{CliPublisher, DeployStrategy, DeploymentBackend, UploadClient};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::process::StageRunner;
use crate::source::GitFetcher;
use crate::workspace::WorkspaceManager;

/// Unified application context for dependency injection.
///
/// Frontends (CLI/HTTP server) create this once from the loaded
/// configuration and ask it for fully wired services.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ShipyardConfig,
    config_path: Option<PathBuf>,
}

impl AppContext {
    pub fn new(config: ShipyardConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    /// Load configuration from `path` (or the default location).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let store = ConfigStore::new(path)?;
        let config = store.load()?;
        Ok(Self {
            config,
            config_path: Some(store.config_path().to_path_buf()),
        })
    }

    pub fn config(&self) -> &ShipyardConfig {
        &self.config
    }

    /// File the configuration was read from, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Server-configured deploy token.
    pub fn deploy_token(&self) -> Option<&str> {
        self.config
            .server
            .deploy_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn stage_runner(&self) -> StageRunner {
        StageRunner::new(self.config.pipeline.output_cap_bytes)
    }

    pub fn workspace_manager(&self) -> WorkspaceManager {
        WorkspaceManager::new(self.config.pipeline.effective_workspace_root())
    }

    pub fn git_fetcher(&self) -> GitFetcher {
        GitFetcher::new(self.stage_runner())
    }

    pub fn build_executor(&self) -> BuildExecutor {
        BuildExecutor::new(self.stage_runner())
            .with_install_command(self.config.pipeline.install_command.clone())
            .with_manifest(self.config.pipeline.manifest.clone())
    }

    /// Backend for the configured strategy.
    pub fn deployment_backend(&self) -> anyhow::Result<Arc<dyn DeploymentBackend>> {
        let backend: Arc<dyn DeploymentBackend> = match self.config.deploy.strategy {
            DeployStrategy::Upload => {
                let endpoint = self.config.upload_endpoint()?;
                Arc::new(UploadClient::new(endpoint).context("Failed to create upload client")?)
            }
            DeployStrategy::Cli => {
                let cli = &self.config.deploy.cli;
                let publisher = CliPublisher::new(self.stage_runner())
                    .context("Failed to create deployment CLI publisher")?
                    .with_program(cli.program.clone(), cli.args.clone())
                    .with_token_env(cli.token_env.clone())
                    .with_url_pattern(&cli.url_pattern)
                    .context("Invalid deploy.cli.url_pattern")?;
                Arc::new(publisher)
            }
        };
        Ok(backend)
    }

    /// Fully wired pipeline.
    pub fn pipeline(&self) -> anyhow::Result<Pipeline> {
        Ok(Pipeline::new(
            self.workspace_manager(),
            Arc::new(self.git_fetcher()),
            self.build_executor(),
            self.deployment_backend()?,
        )
        .with_settings(PipelineSettings::from(&self.config.pipeline)))
    }
}
