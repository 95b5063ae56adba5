//! Shipyard Core Library
//!
//! Turns a source repository into a live deployment: fetch into an isolated
//! workspace, install and build, collect the output, and publish through an
//! artifact-upload API or a deployment CLI.

pub mod api;
pub mod artifact;
pub mod build;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod source;
pub mod types;
pub mod workspace;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, ShipyardConfig};
    pub use crate::context::AppContext;

    // Pipeline
    pub use crate::pipeline::{Pipeline, PipelineSettings, PipelineState, ProjectNaming};
    pub use crate::types::{Artifact, DeploymentRequest, DeploymentResult};

    // Stages
    pub use crate::build::BuildExecutor;
    pub use crate::process::{StageCommand, StageResult, StageRunner};
    pub use crate::source::{GitFetcher, RepositoryFetcher, SourceSpec};
    pub use crate::workspace::{Workspace, WorkspaceManager, WorkspaceStats};

    // Deployment
    pub use crate::deploy::{CliPublisher, DeployStrategy, DeploymentBackend, UploadClient};

    // Errors
    pub use crate::error::{CleanupError, PipelineError, PipelineResult, Stage};
}
