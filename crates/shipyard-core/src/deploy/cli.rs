//! Deployment through an external command-line tool.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use super::{DeployTarget, DeploymentBackend};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::process::{StageCommand, StageRunner};
use crate::types::DeploymentResult;

/// Default deployment tool, looked up on `PATH`.
pub const DEFAULT_CLI_PROGRAM: &str = "vercel";

/// Default arguments; `{token}` is replaced with the deploy token.
pub const DEFAULT_CLI_ARGS: &[&str] = &["deploy", "--prod", "--yes", "--token", "{token}"];

/// Public deployment-domain pattern searched for in the tool's stdout.
pub const DEFAULT_URL_PATTERN: &str =
    r"https://[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9-]+)*\.vercel\.app";

const TOKEN_PLACEHOLDER: &str = "{token}";

/// Runs a deployment CLI non-interactively and scrapes the URL it prints.
#[derive(Debug, Clone)]
pub struct CliPublisher {
    runner: StageRunner,
    program: String,
    args: Vec<String>,
    token_env: Option<String>,
    url_pattern: Regex,
}

impl CliPublisher {
    /// Publisher with the default program, arguments, and URL pattern.
    pub fn new(runner: StageRunner) -> PipelineResult<Self> {
        Ok(Self {
            runner,
            program: DEFAULT_CLI_PROGRAM.to_string(),
            args: DEFAULT_CLI_ARGS.iter().map(|a| a.to_string()).collect(),
            token_env: None,
            url_pattern: compile_pattern(DEFAULT_URL_PATTERN)?,
        })
    }

    pub fn with_program(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    /// Also expose the token to the tool through this environment variable.
    pub fn with_token_env(mut self, var: Option<String>) -> Self {
        self.token_env = var.filter(|v| !v.is_empty());
        self
    }

    pub fn with_url_pattern(mut self, pattern: &str) -> PipelineResult<Self> {
        self.url_pattern = compile_pattern(pattern)?;
        Ok(self)
    }

    /// First deployment URL in `output`, verbatim.
    pub fn extract_url(&self, output: &str) -> Option<String> {
        self.url_pattern
            .find(output)
            .map(|m| m.as_str().to_string())
    }

    /// Run the tool in `project_root`.
    ///
    /// A clean exit with no URL in stdout is a hard failure.
    pub async fn publish(
        &self,
        project_root: &Path,
        deploy_token: &str,
        timeout: Duration,
    ) -> PipelineResult<DeploymentResult> {
        let args = self
            .args
            .iter()
            .map(|a| a.replace(TOKEN_PLACEHOLDER, deploy_token))
            .collect();
        let command = StageCommand::exec(&self.program, args);
        let env: Vec<(String, String)> = self
            .token_env
            .iter()
            .map(|var| (var.clone(), deploy_token.to_string()))
            .collect();

        info!(program = %self.program, root = %project_root.display(), "publishing with deployment CLI");
        let result = tokio::time::timeout(timeout, self.runner.run(&command, project_root, &env))
            .await
            .map_err(|_| PipelineError::Timeout(timeout))?;

        if !result.exited_ok {
            warn!(program = %self.program, exit_code = ?result.exit_code, "deployment CLI failed");
            return Err(PipelineError::stage_failed(
                Stage::Publish,
                result.failure_detail(),
            ));
        }

        match self.extract_url(&result.stdout) {
            Some(url) => Ok(DeploymentResult::succeeded(url)),
            None => {
                warn!(program = %self.program, "deployment CLI printed no deployment URL");
                Err(PipelineError::NoDeploymentUrl)
            }
        }
    }
}

fn compile_pattern(pattern: &str) -> PipelineResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| PipelineError::Internal(format!("invalid deployment URL pattern: {e}")))
}

#[async_trait]
impl DeploymentBackend for CliPublisher {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn requires_artifacts(&self) -> bool {
        false
    }

    async fn deploy(&self, target: &DeployTarget<'_>) -> PipelineResult<DeploymentResult> {
        self.publish(target.project_root, target.deploy_token, target.time_remaining)
            .await
    }
}
