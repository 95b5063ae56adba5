//! Configuration schema for shipyard.toml
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//! deploy_token = "..."
//!
//! [pipeline]
//! timeout_secs = 300
//! build_command = "npm run build"
//! project_name = "repository"
//!
//! [deploy]
//! strategy = "cli"
//!
//! [deploy.cli]
//! program = "vercel"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::build::{DEFAULT_INSTALL_COMMAND, DEFAULT_MANIFEST};
use crate::deploy::{
    DEFAULT_CLI_ARGS, DEFAULT_CLI_PROGRAM, DEFAULT_UPLOAD_ENDPOINT, DEFAULT_URL_PATTERN,
    DeployStrategy,
};
use crate::pipeline::ProjectNaming;
use crate::process::DEFAULT_OUTPUT_CAP;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_BUILD_COMMAND: &str = "npm run build";
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "dist";
pub const DEFAULT_FRAMEWORK: &str = "vite";

/// Root configuration structure for shipyard.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipyardConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub deploy: DeployConfig,
}

/// HTTP endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for `shipyard serve`
    pub bind: String,

    /// Deploy token used when a request carries none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            deploy_token: None,
        }
    }
}

/// Pipeline defaults and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parent directory for per-attempt workspaces (default: system temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Budget for one whole attempt
    pub timeout_secs: u64,

    /// Combined stdout+stderr cap per stage
    pub output_cap_bytes: usize,

    /// Dependency installation command; empty skips the stage
    pub install_command: String,

    /// Build-tool manifest required at the project root; empty skips the check
    pub manifest: String,

    pub build_command: String,
    pub output_directory: String,
    pub framework: String,

    /// Deployment name rule
    pub project_name: ProjectNaming,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            output_cap_bytes: DEFAULT_OUTPUT_CAP,
            install_command: DEFAULT_INSTALL_COMMAND.to_string(),
            manifest: DEFAULT_MANIFEST.to_string(),
            build_command: DEFAULT_BUILD_COMMAND.to_string(),
            output_directory: DEFAULT_OUTPUT_DIRECTORY.to_string(),
            framework: DEFAULT_FRAMEWORK.to_string(),
            project_name: ProjectNaming::default(),
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured workspace root, or `<temp>/shipyard`.
    pub fn effective_workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("shipyard"))
    }
}

/// Deployment backend selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub strategy: DeployStrategy,
    pub upload: UploadConfig,
    pub cli: CliConfig,
}

/// Artifact-upload API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
        }
    }
}

/// Deployment CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub program: String,

    /// Arguments; `{token}` is replaced with the deploy token
    pub args: Vec<String>,

    /// Environment variable that also receives the deploy token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Regex matching the public deployment URL in the tool's stdout
    pub url_pattern: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_CLI_PROGRAM.to_string(),
            args: DEFAULT_CLI_ARGS.iter().map(|a| a.to_string()).collect(),
            token_env: None,
            url_pattern: DEFAULT_URL_PATTERN.to_string(),
        }
    }
}

impl ShipyardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.timeout_secs == 0 {
            bail!("pipeline.timeout_secs must be greater than zero");
        }
        if self.pipeline.output_cap_bytes == 0 {
            bail!("pipeline.output_cap_bytes must be greater than zero");
        }
        if self.pipeline.build_command.trim().is_empty() {
            bail!("pipeline.build_command must not be empty");
        }
        if self.pipeline.output_directory.trim().is_empty() {
            bail!("pipeline.output_directory must not be empty");
        }
        if let ProjectNaming::Fixed(name) = &self.pipeline.project_name
            && name.trim().is_empty()
        {
            bail!("pipeline.project_name.fixed must not be empty");
        }

        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid server.bind address: '{}'", self.server.bind))?;

        let endpoint = self.upload_endpoint()?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!(
                "deploy.upload.endpoint must use http or https: '{}'",
                self.deploy.upload.endpoint
            );
        }

        if self.deploy.cli.program.trim().is_empty() {
            bail!("deploy.cli.program must not be empty");
        }
        regex::Regex::new(&self.deploy.cli.url_pattern).with_context(|| {
            format!(
                "Invalid deploy.cli.url_pattern: '{}'",
                self.deploy.cli.url_pattern
            )
        })?;

        Ok(())
    }

    /// Parsed upload endpoint.
    pub fn upload_endpoint(&self) -> anyhow::Result<url::Url> {
        url::Url::parse(&self.deploy.upload.endpoint).with_context(|| {
            format!(
                "Invalid deploy.upload.endpoint: '{}'",
                self.deploy.upload.endpoint
            )
        })
    }

    /// Copy safe to print: the deploy token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.server.deploy_token.is_some() {
            copy.server.deploy_token = Some("********".to_string());
        }
        copy
    }
}
