//! Artifact-upload API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::{DeployTarget, DeploymentBackend};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{Artifact, DeploymentResult};

/// Default deployment API endpoint.
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://api.vercel.com/v13/deployments";

const GENERIC_FAILURE: &str = "deployment failed";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadBody<'a> {
    name: &'a str,
    files: Vec<UploadFile<'a>>,
    project_settings: ProjectSettings<'a>,
}

#[derive(Serialize)]
struct UploadFile<'a> {
    file: &'a str,
    data: String,
    encoding: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSettings<'a> {
    framework: &'a str,
    output_directory: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    alias: Vec<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    ready_state: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    inspector_url: Option<String>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Submits collected artifacts to a deployment API in a single request.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl UploadClient {
    pub fn new(endpoint: Url) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Upload `artifacts` as one deployment named `project_name`.
    ///
    /// A non-success status becomes [`PipelineError::Deployment`] carrying the
    /// backend's message and status code.
    pub async fn submit(
        &self,
        artifacts: &[Artifact],
        deploy_token: &str,
        project_name: &str,
        framework: &str,
        output_directory: &str,
    ) -> PipelineResult<DeploymentResult> {
        let body = UploadBody {
            name: project_name,
            files: artifacts
                .iter()
                .map(|a| UploadFile {
                    file: &a.relative_path,
                    data: a.encoded(),
                    encoding: "base64",
                })
                .collect(),
            project_settings: ProjectSettings {
                framework,
                output_directory,
            },
        };

        info!(
            endpoint = %self.endpoint,
            project = project_name,
            files = artifacts.len(),
            "uploading artifacts"
        );
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(deploy_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                PipelineError::deployment(format!("failed to reach deployment API: {e}"), None)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PipelineError::deployment(
                format!("failed to read deployment API response: {e}"),
                Some(status.as_u16()),
            )
        })?;
        let parsed: Option<UploadResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|r| r.error)
                .and_then(|e| e.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            warn!(status = status.as_u16(), error = %message, "deployment API rejected upload");
            return Err(PipelineError::deployment(message, Some(status.as_u16())));
        }

        let parsed = parsed.ok_or_else(|| {
            PipelineError::deployment(
                "deployment API returned an unreadable response",
                Some(status.as_u16()),
            )
        })?;
        let url = parsed
            .url
            .filter(|u| !u.is_empty())
            .or_else(|| parsed.alias.into_iter().next())
            .ok_or(PipelineError::NoDeploymentUrl)?;

        Ok(DeploymentResult::succeeded(url)
            .with_deployment_id(parsed.id)
            .with_status(parsed.ready_state.or(parsed.status))
            .with_inspector_url(parsed.inspector_url))
    }
}

#[async_trait]
impl DeploymentBackend for UploadClient {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn requires_artifacts(&self) -> bool {
        true
    }

    async fn deploy(&self, target: &DeployTarget<'_>) -> PipelineResult<DeploymentResult> {
        self.submit(
            target.artifacts,
            target.deploy_token,
            target.project_name,
            target.framework,
            target.output_directory,
        )
        .await
    }
}
