//! Error types for the deployment pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Request validation, before any side effect.
    Validate,
    /// Repository fetch into the workspace.
    Fetch,
    /// Dependency installation.
    Install,
    /// Build command.
    Build,
    /// Build output collection.
    Collect,
    /// Hand-off to the deployment backend.
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Fetch => write!(f, "fetch"),
            Self::Install => write!(f, "install"),
            Self::Build => write!(f, "build"),
            Self::Collect => write!(f, "collect"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Fetch,
    Build,
    Collect,
    Deployment,
    Timeout,
    Internal,
}

/// Errors that terminate a deployment attempt.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ─────────────────────────────────────────────────────────────────────────
    // Request errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Missing or invalid request field.
    #[error("{0}")]
    Validation(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Source errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Repository could not be fetched.
    #[error("failed to fetch repository {url}: {message}")]
    Fetch {
        /// Source location as given.
        url: String,
        /// Error message.
        message: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Build errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Effective project root does not exist.
    #[error("directory not found: {0}")]
    ProjectRootMissing(PathBuf),

    /// Build-tool manifest is absent at the project root.
    #[error("no project descriptor: {manifest} not found in {}", root.display())]
    ManifestMissing {
        /// Manifest file name.
        manifest: String,
        /// Project root that was searched.
        root: PathBuf,
    },

    /// An install or build stage exited unsuccessfully.
    #[error("{detail}")]
    StageFailed {
        /// Failing stage.
        stage: Stage,
        /// Captured stderr, or the process failure message.
        detail: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Collect errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Declared output directory is absent after a successful build.
    #[error("output directory missing: {}", .0.display())]
    OutputMissing(PathBuf),

    /// Reading the build output failed.
    #[error("failed to read build output {}: {source}", path.display())]
    CollectIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Deployment errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Deployment backend rejected the deployment.
    #[error("{message}")]
    Deployment {
        /// Backend-provided message, or a generic fallback.
        message: String,
        /// HTTP status reported by the backend, if any.
        status: Option<u16>,
    },

    /// Backend finished but produced no usable URL.
    #[error("no URL in output")]
    NoDeploymentUrl,

    // ─────────────────────────────────────────────────────────────────────────
    // Runtime errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Overall time budget exceeded.
    #[error("deployment timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Workspace could not be allocated.
    #[error("failed to allocate workspace: {0}")]
    Workspace(#[source] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a stage failure.
    pub fn stage_failed(stage: Stage, detail: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            detail: detail.into(),
        }
    }

    /// Build a backend rejection.
    pub fn deployment(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Deployment {
            message: message.into(),
            status,
        }
    }

    /// Taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::ProjectRootMissing(_) | Self::ManifestMissing { .. } => ErrorKind::Build,
            Self::StageFailed { stage, .. } => match stage {
                Stage::Fetch => ErrorKind::Fetch,
                Stage::Publish => ErrorKind::Deployment,
                _ => ErrorKind::Build,
            },
            Self::OutputMissing(_) | Self::CollectIo { .. } => ErrorKind::Collect,
            Self::Deployment { .. } | Self::NoDeploymentUrl => ErrorKind::Deployment,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Workspace(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stage the failure is attributed to, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Validation(_) => Some(Stage::Validate),
            Self::Fetch { .. } => Some(Stage::Fetch),
            Self::ProjectRootMissing(_) | Self::ManifestMissing { .. } => Some(Stage::Build),
            Self::StageFailed { stage, .. } => Some(*stage),
            Self::OutputMissing(_) | Self::CollectIo { .. } => Some(Stage::Collect),
            Self::Deployment { .. } | Self::NoDeploymentUrl => Some(Stage::Publish),
            Self::Timeout(_) | Self::Workspace(_) | Self::Internal(_) => None,
        }
    }

    /// HTTP status the API reports for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Deployment {
                status: Some(status),
                ..
            } if (400..=599).contains(status) => *status,
            Self::Timeout(_) => 504,
            _ => 500,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Workspace deletion failed.
///
/// Never surfaced to the caller of a deployment; the orchestrator logs it.
#[derive(Debug, Error)]
#[error("failed to remove workspace {}: {source}", path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = PipelineError::validation("sourceUrl is required");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "sourceUrl is required");
    }

    #[test]
    fn backend_status_is_propagated() {
        let err = PipelineError::deployment("forbidden", Some(403));
        assert_eq!(err.http_status(), 403);
        assert_eq!(err.stage(), Some(Stage::Publish));
    }

    #[test]
    fn backend_rejection_without_status_is_internal() {
        let err = PipelineError::deployment("deployment failed", None);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn stage_failure_displays_captured_detail() {
        let err = PipelineError::stage_failed(Stage::Build, "vite: command not found");
        assert_eq!(err.to_string(), "vite: command not found");
        assert_eq!(err.kind(), ErrorKind::Build);
        assert_eq!(err.stage(), Some(Stage::Build));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn timeout_has_no_stage() {
        let err = PipelineError::Timeout(Duration::from_secs(300));
        assert_eq!(err.stage(), None);
        assert_eq!(err.http_status(), 504);
        assert_eq!(err.to_string(), "deployment timed out after 300s");
    }

    #[test]
    fn stage_names_are_lowercase() {
        assert_eq!(Stage::Install.to_string(), "install");
        assert_eq!(
            serde_json::to_string(&Stage::Publish).unwrap(),
            "\"publish\""
        );
    }
}
