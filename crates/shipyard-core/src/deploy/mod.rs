//! Deployment backends.
//!
//! Two interchangeable strategies hand a built project to a deployment
//! platform and report the same [`DeploymentResult`] shape:
//! - [`UploadClient`] posts collected artifacts to an artifact-upload API
//! - [`CliPublisher`] runs a deployment CLI against the project directory

mod cli;
mod upload;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::types::{Artifact, DeploymentResult};

pub use cli::{CliPublisher, DEFAULT_CLI_ARGS, DEFAULT_CLI_PROGRAM, DEFAULT_URL_PATTERN};
pub use upload::{DEFAULT_UPLOAD_ENDPOINT, UploadClient};

/// Which backend the pipeline publishes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStrategy {
    /// Artifact-upload API.
    #[default]
    Upload,
    /// External deployment command-line tool.
    Cli,
}

impl std::fmt::Display for DeployStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

impl std::str::FromStr for DeployStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upload" => Ok(Self::Upload),
            "cli" => Ok(Self::Cli),
            other => Err(format!("unknown deploy strategy '{other}' (expected upload or cli)")),
        }
    }
}

/// Everything a backend may need for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct DeployTarget<'a> {
    /// Effective project root inside the workspace.
    pub project_root: &'a Path,
    /// Collected build output; empty for backends that do not need it.
    pub artifacts: &'a [Artifact],
    pub deploy_token: &'a str,
    pub project_name: &'a str,
    pub framework: &'a str,
    pub output_directory: &'a str,
    /// Time left in the attempt's budget.
    pub time_remaining: Duration,
}

/// A deployment platform the pipeline can publish to.
#[async_trait]
pub trait DeploymentBackend: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the pipeline must collect artifacts before publishing.
    fn requires_artifacts(&self) -> bool;

    /// Publish and report the resulting deployment.
    async fn deploy(&self, target: &DeployTarget<'_>) -> PipelineResult<DeploymentResult>;
}
