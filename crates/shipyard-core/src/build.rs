//! Build executor: dependency install followed by the build command.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult, Stage};
use crate::process::{StageCommand, StageRunner};

/// Default dependency installation command.
pub const DEFAULT_INSTALL_COMMAND: &str = "npm install";
/// Default build-tool manifest expected at the project root.
pub const DEFAULT_MANIFEST: &str = "package.json";

/// Runs install and build stages inside a workspace.
///
/// Both commands are configurable so the executor works with any build tool;
/// an empty install command skips that stage, an empty manifest skips the
/// descriptor check.
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    runner: StageRunner,
    install_command: String,
    manifest: String,
    env: Vec<(String, String)>,
}

impl BuildExecutor {
    pub fn new(runner: StageRunner) -> Self {
        Self {
            runner,
            install_command: DEFAULT_INSTALL_COMMAND.to_string(),
            manifest: DEFAULT_MANIFEST.to_string(),
            env: Vec::new(),
        }
    }

    pub fn with_install_command(mut self, command: impl Into<String>) -> Self {
        self.install_command = command.into();
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Extra environment passed to both stages.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Effective project root: the workspace joined with the subdirectory.
    pub fn project_root(workspace_root: &Path, subdir: Option<&str>) -> PathBuf {
        match subdir.map(|s| s.trim().trim_matches('/')).filter(|s| !s.is_empty()) {
            Some(subdir) => workspace_root.join(subdir),
            None => workspace_root.to_path_buf(),
        }
    }

    /// Install dependencies and run `build_command`.
    ///
    /// Returns the effective project root. A failed stage is terminal; there
    /// is no retry.
    pub async fn build(
        &self,
        workspace_root: &Path,
        subdir: Option<&str>,
        build_command: &str,
    ) -> PipelineResult<PathBuf> {
        let root = Self::project_root(workspace_root, subdir);
        let display_root = PathBuf::from(subdir.unwrap_or("."));

        if !root.is_dir() {
            return Err(PipelineError::ProjectRootMissing(display_root));
        }
        if !self.manifest.is_empty() && !root.join(&self.manifest).is_file() {
            return Err(PipelineError::ManifestMissing {
                manifest: self.manifest.clone(),
                root: display_root,
            });
        }

        if !self.install_command.trim().is_empty() {
            self.run_stage(Stage::Install, &self.install_command, &root)
                .await?;
        }
        self.run_stage(Stage::Build, build_command, &root).await?;

        Ok(root)
    }

    async fn run_stage(&self, stage: Stage, command: &str, root: &Path) -> PipelineResult<()> {
        info!(stage = %stage, command, "running stage");
        let result = self
            .runner
            .run(&StageCommand::shell(command), root, &self.env)
            .await;
        if result.exited_ok {
            return Ok(());
        }
        let detail = result.failure_detail();
        warn!(stage = %stage, exit_code = ?result.exit_code, "stage failed");
        Err(PipelineError::stage_failed(stage, detail))
    }
}
