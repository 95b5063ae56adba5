//! Pipeline orchestrator.
//!
//! One [`Pipeline::deploy`] call is one attempt:
//!
//! ```text
//! Validating -> Fetching -> Building -> [Collecting] -> Publishing -> Succeeded
//!      \____________\___________\____________\_____________\-------> Failed
//! ```
//!
//! Validation happens before any workspace exists. Every later state runs
//! inside one acquired workspace which is released exactly once, whatever
//! the outcome. The whole attempt, validation included, shares a single
//! deadline; when it passes, the in-flight stage future is dropped (killing
//! its subprocess) and the attempt fails with a timeout.

mod naming;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact;
use crate::build::BuildExecutor;
use crate::config::PipelineConfig;
use crate::deploy::{DeployTarget, DeploymentBackend};
use crate::error::{PipelineError, PipelineResult};
use crate::source::{RepositoryFetcher, SourceSpec};
use crate::types::{DeploymentRequest, DeploymentResult, ensure_relative_path};
use crate::workspace::{Workspace, WorkspaceManager};

pub use naming::{FALLBACK_PROJECT_NAME, ProjectNaming, sanitize};

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    Fetching,
    Building,
    Collecting,
    Publishing,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Fetching => "fetching",
            Self::Building => "building",
            Self::Collecting => "collecting",
            Self::Publishing => "publishing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Defaults applied to requests that leave a field unset, plus the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub timeout: Duration,
    pub build_command: String,
    pub output_directory: String,
    pub framework: String,
    pub project_naming: ProjectNaming,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            timeout: config.timeout(),
            build_command: config.build_command.clone(),
            output_directory: config.output_directory.clone(),
            framework: config.framework.clone(),
            project_naming: config.project_name.clone(),
        }
    }
}

/// Tracks and logs one attempt's state transitions.
#[derive(Debug)]
struct Attempt<'a> {
    source: &'a str,
    workspace: Option<Uuid>,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl<'a> Attempt<'a> {
    fn start(source: &'a str) -> Self {
        info!(source, state = %PipelineState::Validating, "deployment attempt started");
        Self {
            source,
            workspace: None,
            state: PipelineState::Validating,
            history: vec![PipelineState::Validating],
        }
    }

    fn enter(&mut self, next: PipelineState) {
        info!(
            source = self.source,
            workspace = ?self.workspace,
            from = %self.state,
            to = %next,
            "pipeline transition"
        );
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, err: &PipelineError) {
        warn!(
            source = self.source,
            workspace = ?self.workspace,
            state = %self.state,
            stage = ?err.stage(),
            error = %err,
            "deployment attempt failed"
        );
        self.enter(PipelineState::Failed);
    }
}

/// Request fields with defaults applied and the source parsed.
#[derive(Debug)]
struct ResolvedRequest<'a> {
    source: SourceSpec,
    subdir: Option<String>,
    build_command: &'a str,
    output_directory: &'a str,
    framework: &'a str,
    deploy_token: &'a str,
}

/// Sequences fetch, build, collect and publish for one request at a time.
///
/// Cheap to clone; clones share the workspace counters and backends.
#[derive(Debug, Clone)]
pub struct Pipeline {
    workspaces: WorkspaceManager,
    fetcher: Arc<dyn RepositoryFetcher>,
    builder: BuildExecutor,
    backend: Arc<dyn DeploymentBackend>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        workspaces: WorkspaceManager,
        fetcher: Arc<dyn RepositoryFetcher>,
        builder: BuildExecutor,
        backend: Arc<dyn DeploymentBackend>,
    ) -> Self {
        Self {
            workspaces,
            fetcher,
            builder,
            backend,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run one deployment attempt.
    ///
    /// Returns the backend's result on success. On failure the error is the
    /// most specific one available; [`DeploymentResult::from`] turns it into
    /// the caller-facing shape.
    pub async fn deploy(&self, request: &DeploymentRequest) -> PipelineResult<DeploymentResult> {
        let deadline = Instant::now() + self.settings.timeout;
        let mut attempt = Attempt::start(&request.source_url);

        let resolved = match self.resolve(request) {
            Ok(resolved) => resolved,
            Err(err) => {
                attempt.fail(&err);
                return Err(err);
            }
        };

        let workspace = match self.workspaces.acquire().await {
            Ok(workspace) => workspace,
            Err(err) => {
                attempt.fail(&err);
                return Err(err);
            }
        };
        attempt.workspace = Some(workspace.id());

        let staged = tokio::time::timeout_at(
            deadline,
            self.run_stages(&mut attempt, &workspace, &resolved, deadline),
        )
        .await;
        let outcome = match staged {
            Ok(Err(PipelineError::Timeout(_))) | Err(_) => {
                Err(PipelineError::Timeout(self.settings.timeout))
            }
            Ok(result) => result,
        };

        let path = workspace.path().to_path_buf();
        if let Err(err) = self.workspaces.release(workspace).await {
            warn!(
                workspace = ?attempt.workspace,
                path = %err.path.display(),
                error = %err.source,
                "failed to clean up workspace"
            );
        } else {
            debug!(path = %path.display(), "workspace cleaned up");
        }

        match outcome {
            Ok(result) => {
                attempt.enter(PipelineState::Succeeded);
                info!(url = ?result.url, history = ?attempt.history, "deployment succeeded");
                Ok(result)
            }
            Err(err) => {
                attempt.fail(&err);
                Err(err)
            }
        }
    }

    /// Validate `request` and apply defaults. Performs no I/O.
    fn resolve<'a>(&'a self, request: &'a DeploymentRequest) -> PipelineResult<ResolvedRequest<'a>> {
        request.validate()?;
        let source = SourceSpec::parse(&request.source_url)?;

        let subdir = match request.subdirectory() {
            Some(subdir) => Some(subdir.to_string()),
            None => source.subdir.clone(),
        };
        if let Some(subdir) = &subdir {
            ensure_relative_path("projectSubdirectory", subdir)?;
        }

        Ok(ResolvedRequest {
            source,
            subdir,
            build_command: or_default(request.build_command.as_deref(), &self.settings.build_command),
            output_directory: or_default(
                request.output_directory.as_deref(),
                &self.settings.output_directory,
            ),
            framework: or_default(request.framework.as_deref(), &self.settings.framework),
            deploy_token: request.deploy_token.trim(),
        })
    }

    async fn run_stages(
        &self,
        attempt: &mut Attempt<'_>,
        workspace: &Workspace,
        request: &ResolvedRequest<'_>,
        deadline: Instant,
    ) -> PipelineResult<DeploymentResult> {
        attempt.enter(PipelineState::Fetching);
        let fetched = self.fetcher.fetch(&request.source, workspace.path()).await?;
        debug!(commit = ?fetched.commit_sha, "source fetched");

        attempt.enter(PipelineState::Building);
        let subdir = request.subdir.as_deref();
        let project_root: PathBuf = self
            .builder
            .build(workspace.path(), subdir, request.build_command)
            .await?;

        let artifacts = if self.backend.requires_artifacts() {
            attempt.enter(PipelineState::Collecting);
            artifact::collect_async(project_root.clone(), request.output_directory.to_string())
                .await?
        } else {
            Vec::new()
        };

        attempt.enter(PipelineState::Publishing);
        let project_name = self.settings.project_naming.resolve(&request.source, subdir);
        let target = DeployTarget {
            project_root: &project_root,
            artifacts: &artifacts,
            deploy_token: request.deploy_token,
            project_name: &project_name,
            framework: request.framework,
            output_directory: request.output_directory,
            time_remaining: deadline.saturating_duration_since(Instant::now()),
        };
        info!(
            backend = self.backend.name(),
            project = %project_name,
            artifacts = artifacts.len(),
            "publishing deployment"
        );
        self.backend.deploy(&target).await
    }
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default)
}
