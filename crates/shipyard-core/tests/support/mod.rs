//! Shared helpers for shipyard-core integration tests.
#![allow(dead_code)]

pub mod backend;
pub mod git;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use shipyard_core::build::BuildExecutor;
use shipyard_core::deploy::DeploymentBackend;
use shipyard_core::pipeline::{Pipeline, PipelineSettings};
use shipyard_core::process::StageRunner;
use shipyard_core::source::GitFetcher;
use shipyard_core::workspace::WorkspaceManager;

pub use backend::{RecordedDeploy, RecordingBackend};
pub use git::{STATIC_BUILD, fixture_repo, static_site};

/// Pipeline with real git and shell stages, no install step, and `backend`.
pub fn pipeline(workspace_root: &Path, backend: Arc<dyn DeploymentBackend>) -> Pipeline {
    pipeline_with_install(workspace_root, backend, "")
}

pub fn pipeline_with_install(
    workspace_root: &Path,
    backend: Arc<dyn DeploymentBackend>,
    install_command: &str,
) -> Pipeline {
    let runner = StageRunner::default();
    Pipeline::new(
        WorkspaceManager::new(workspace_root),
        Arc::new(GitFetcher::new(runner.clone())),
        BuildExecutor::new(runner).with_install_command(install_command),
        backend,
    )
    .with_settings(PipelineSettings {
        build_command: STATIC_BUILD.to_string(),
        timeout: Duration::from_secs(60),
        ..PipelineSettings::default()
    })
}

/// Directories currently present under a workspace root.
pub fn leftover_workspaces(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Poll until no workspaces remain under `root`; abandoned attempts are
/// removed in the background.
pub async fn wait_for_no_leftovers(root: &Path) -> Vec<PathBuf> {
    for _ in 0..250 {
        let leftovers = leftover_workspaces(root);
        if leftovers.is_empty() {
            return leftovers;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    leftover_workspaces(root)
}
