//! In-memory deployment backend that records what it was given.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use shipyard_core::deploy::{DeployTarget, DeploymentBackend};
use shipyard_core::error::{PipelineError, PipelineResult};
use shipyard_core::types::{Artifact, DeploymentResult};

#[derive(Debug, Clone)]
pub struct RecordedDeploy {
    pub project_root: PathBuf,
    pub project_name: String,
    pub deploy_token: String,
    pub framework: String,
    pub output_directory: String,
    pub artifacts: Vec<Artifact>,
    /// Whether the project root still existed when the backend ran.
    pub root_existed: bool,
}

#[derive(Debug)]
pub struct RecordingBackend {
    rejection: Option<(String, u16)>,
    requires_artifacts: bool,
    calls: Mutex<Vec<RecordedDeploy>>,
}

impl RecordingBackend {
    /// Succeeds with `https://<project>.example.app`.
    pub fn succeeding() -> Self {
        Self {
            rejection: None,
            requires_artifacts: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Rejects every deployment like an upload API would.
    pub fn rejecting(message: &str, status: u16) -> Self {
        Self {
            rejection: Some((message.to_string(), status)),
            ..Self::succeeding()
        }
    }

    /// Publishes from the project directory without collected artifacts.
    pub fn directory_based() -> Self {
        Self {
            requires_artifacts: false,
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> Vec<RecordedDeploy> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn requires_artifacts(&self) -> bool {
        self.requires_artifacts
    }

    async fn deploy(&self, target: &DeployTarget<'_>) -> PipelineResult<DeploymentResult> {
        self.calls.lock().unwrap().push(RecordedDeploy {
            project_root: target.project_root.to_path_buf(),
            project_name: target.project_name.to_string(),
            deploy_token: target.deploy_token.to_string(),
            framework: target.framework.to_string(),
            output_directory: target.output_directory.to_string(),
            artifacts: target.artifacts.to_vec(),
            root_existed: target.project_root.is_dir(),
        });

        match &self.rejection {
            Some((message, status)) => Err(PipelineError::deployment(message, Some(*status))),
            None => Ok(DeploymentResult::succeeded(format!(
                "https://{}.example.app",
                target.project_name
            ))
            .with_deployment_id(Some(format!("dpl_{}", target.project_name)))),
        }
    }
}
