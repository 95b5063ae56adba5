//! Git fetcher for cloning a repository into a workspace.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::SourceSpec;
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::process::{StageCommand, StageRunner};

/// Result of a successful fetch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Resolved commit SHA of the checked-out tree, when it could be read.
    pub commit_sha: Option<String>,
}

/// Materializes a repository's working tree into a destination directory.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync + std::fmt::Debug {
    /// Populate `destination` (an existing, empty directory) with the
    /// repository's full working tree.
    async fn fetch(&self, source: &SourceSpec, destination: &Path) -> PipelineResult<FetchResult>;
}

/// Fetches repositories with the `git` executable.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    runner: StageRunner,
}

impl GitFetcher {
    pub fn new(runner: StageRunner) -> Self {
        Self { runner }
    }

    /// Run a git command in `cwd`, mapping failure to a fetch error.
    async fn run_git(&self, source: &SourceSpec, cwd: &Path, args: &[&str]) -> PipelineResult<()> {
        let command = StageCommand::exec("git", args.iter().map(|a| a.to_string()).collect());
        let env = [
            ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
            ("GIT_ASKPASS".to_string(), "echo".to_string()),
        ];
        let result = self.runner.run(&command, cwd, &env).await;
        if !result.exited_ok {
            return Err(PipelineError::Fetch {
                url: source.repo_url.clone(),
                message: result.failure_detail(),
            });
        }
        Ok(())
    }

    /// Read the checked-out HEAD commit.
    fn head_commit(destination: &Path) -> Option<String> {
        let repo = git2::Repository::open(destination).ok()?;
        let commit = repo.head().ok()?.peel_to_commit().ok()?;
        Some(commit.id().to_string())
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new(StageRunner::default())
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(&self, source: &SourceSpec, destination: &Path) -> PipelineResult<FetchResult> {
        let dest = destination.to_str().ok_or_else(|| {
            PipelineError::Internal(format!(
                "workspace path is not valid UTF-8: {}",
                destination.display()
            ))
        })?;

        debug!(url = %source.repo_url, reference = ?source.reference, "cloning repository");
        match source.reference.as_deref() {
            // Shallow clone of the default branch.
            None => {
                self.run_git(
                    source,
                    destination,
                    &["clone", "--quiet", "--depth", "1", "--", source.repo_url.as_str(), dest],
                )
                .await?;
            }
            Some(reference) => {
                if reference.starts_with('-') {
                    return Err(PipelineError::Fetch {
                        url: source.repo_url.clone(),
                        message: format!("invalid reference '{reference}'"),
                    });
                }
                self.run_git(
                    source,
                    destination,
                    &["clone", "--quiet", "--", source.repo_url.as_str(), dest],
                )
                .await?;
                self.run_git(
                    source,
                    destination,
                    &["checkout", "--quiet", reference],
                )
                .await
                .map_err(|err| match err {
                    PipelineError::Fetch { url, message } => PipelineError::Fetch {
                        url,
                        message: format!("cannot check out '{reference}': {message}"),
                    },
                    other => other,
                })?;
            }
        }

        let commit_sha = Self::head_commit(destination);
        info!(
            url = %source.repo_url,
            commit = commit_sha.as_deref().unwrap_or("unknown"),
            stage = %Stage::Fetch,
            "repository fetched"
        );
        Ok(FetchResult { commit_sha })
    }
}
