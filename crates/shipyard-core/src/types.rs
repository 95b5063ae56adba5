//! Request, artifact, and result types shared across the pipeline.

use std::path::{Component, Path};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// One deployment attempt's input.
///
/// Created per incoming call and never mutated once the pipeline starts.
/// Legacy field names (`repoUrl`, `vercelToken`, `projectDirectory`) are
/// accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    /// Fetchable repository location.
    #[serde(default, alias = "repoUrl")]
    pub source_url: String,
    /// Opaque deployment-backend credential.
    #[serde(default, alias = "vercelToken", skip_serializing)]
    pub deploy_token: String,
    /// Relative path within the repository to treat as project root.
    #[serde(default, alias = "projectDirectory")]
    pub project_subdirectory: Option<String>,
    /// Framework hint passed to the backend.
    #[serde(default)]
    pub framework: Option<String>,
    /// Build command override.
    #[serde(default)]
    pub build_command: Option<String>,
    /// Build output directory override, relative to the project root.
    #[serde(default)]
    pub output_directory: Option<String>,
}

impl DeploymentRequest {
    pub fn new(source_url: impl Into<String>, deploy_token: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            deploy_token: deploy_token.into(),
            ..Self::default()
        }
    }

    pub fn with_subdirectory(mut self, subdir: impl Into<String>) -> Self {
        self.project_subdirectory = Some(subdir.into());
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    pub fn with_build_command(mut self, command: impl Into<String>) -> Self {
        self.build_command = Some(command.into());
        self
    }

    pub fn with_output_directory(mut self, dir: impl Into<String>) -> Self {
        self.output_directory = Some(dir.into());
        self
    }

    /// Fill in the deploy token from server configuration when the caller
    /// did not supply one.
    pub fn or_token(mut self, fallback: Option<&str>) -> Self {
        if self.deploy_token.trim().is_empty()
            && let Some(token) = fallback
        {
            self.deploy_token = token.to_string();
        }
        self
    }

    /// Check required fields and path shapes.
    ///
    /// Performs no I/O.
    pub fn validate(&self) -> PipelineResult<()> {
        let mut missing = Vec::new();
        if self.source_url.trim().is_empty() {
            missing.push("sourceUrl");
        }
        if self.deploy_token.trim().is_empty() {
            missing.push("deployToken");
        }
        if !missing.is_empty() {
            return Err(PipelineError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        if let Some(subdir) = non_blank(self.project_subdirectory.as_deref()) {
            ensure_relative_path("projectSubdirectory", subdir)?;
        }
        if let Some(output) = self.output_directory.as_deref() {
            if output.trim().is_empty() {
                return Err(PipelineError::validation("outputDirectory must not be empty"));
            }
            ensure_relative_path("outputDirectory", output)?;
        }
        if let Some(command) = self.build_command.as_deref()
            && command.trim().is_empty()
        {
            return Err(PipelineError::validation("buildCommand must not be empty"));
        }
        Ok(())
    }

    /// Subdirectory with blank values treated as absent.
    pub fn subdirectory(&self) -> Option<&str> {
        non_blank(self.project_subdirectory.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn ensure_relative_path(field: &str, value: &str) -> PipelineResult<()> {
    let path = Path::new(value);
    if path.is_absolute() || value.starts_with('/') || value.starts_with('\\') {
        return Err(PipelineError::validation(format!(
            "{field} must be a relative path: {value}"
        )));
    }
    for component in path.components() {
        if let Component::ParentDir | Component::Prefix(_) = component {
            return Err(PipelineError::validation(format!(
                "{field} must not leave the repository: {value}"
            )));
        }
    }
    Ok(())
}

/// One file of build output ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Slash-separated path relative to the output directory.
    pub relative_path: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
}

impl Artifact {
    pub fn new(relative_path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content,
        }
    }

    /// Content encoded for JSON transport.
    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.content)
    }
}

/// Outcome of a deployment attempt, as reported to callers.
///
/// Either `success` with `url` set, or failure with `error_message` set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    /// Backend-reported readiness state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector_url: Option<String>,
    #[serde(default, rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DeploymentResult {
    pub fn succeeded(url: impl Into<String>) -> Self {
        Self {
            success: true,
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_deployment_id(mut self, id: Option<String>) -> Self {
        self.deployment_id = id;
        self
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status;
        self
    }

    pub fn with_inspector_url(mut self, url: Option<String>) -> Self {
        self.inspector_url = url;
        self
    }
}

impl From<&PipelineError> for DeploymentResult {
    fn from(err: &PipelineError) -> Self {
        Self::failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_legacy_field_names() {
        let request: DeploymentRequest = serde_json::from_value(serde_json::json!({
            "repoUrl": "https://github.com/org/app.git",
            "vercelToken": "tok",
            "projectDirectory": "client"
        }))
        .unwrap();

        assert_eq!(request.source_url, "https://github.com/org/app.git");
        assert_eq!(request.deploy_token, "tok");
        assert_eq!(request.subdirectory(), Some("client"));
    }

    #[test]
    fn missing_fields_are_named() {
        let err = DeploymentRequest::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required fields: sourceUrl, deployToken"
        );
    }

    #[test]
    fn whitespace_token_is_missing() {
        let err = DeploymentRequest::new("https://example/repo.git", "  ")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("deployToken"));
    }

    #[test]
    fn rejects_escaping_paths() {
        let request =
            DeploymentRequest::new("https://example/repo.git", "tok").with_subdirectory("../etc");
        assert!(request.validate().is_err());

        let request =
            DeploymentRequest::new("https://example/repo.git", "tok").with_output_directory("/dist");
        assert!(request.validate().is_err());

        let request = DeploymentRequest::new("https://example/repo.git", "tok")
            .with_subdirectory("apps/web")
            .with_output_directory("build/client");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn token_fallback_only_fills_blank() {
        let request = DeploymentRequest::new("https://example/repo.git", "")
            .or_token(Some("server-token"));
        assert_eq!(request.deploy_token, "server-token");

        let request = DeploymentRequest::new("https://example/repo.git", "caller")
            .or_token(Some("server-token"));
        assert_eq!(request.deploy_token, "caller");
    }

    #[test]
    fn token_is_not_serialized() {
        let request = DeploymentRequest::new("https://example/repo.git", "secret");
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn result_serializes_wire_names() {
        let result = DeploymentResult::succeeded("app.example.app")
            .with_deployment_id(Some("dpl_1".to_string()))
            .with_status(Some("READY".to_string()));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["url"], "app.example.app");
        assert_eq!(json["id"], "dpl_1");
        assert_eq!(json["status"], "READY");
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(DeploymentResult::failed("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn artifact_content_is_base64() {
        let artifact = Artifact::new("index.html", b"<h1>hi</h1>".to_vec());
        assert_eq!(artifact.encoded(), "PGgxPmhpPC9oMT4=");
    }
}
