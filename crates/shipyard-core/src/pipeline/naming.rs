//! Deployment name derivation.

use serde::{Deserialize, Serialize};

use crate::source::SourceSpec;

/// Name used when nothing usable can be derived.
pub const FALLBACK_PROJECT_NAME: &str = "shipyard-deployment";

/// How the deployment name sent to the backend is chosen.
///
/// In TOML: `project_name = "repository"`, `project_name = "subdirectory"`,
/// or `project_name = { fixed = "landing" }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectNaming {
    /// Repository name from the source URL.
    #[default]
    Repository,
    /// Last component of the project subdirectory, else the repository name.
    Subdirectory,
    /// The same name for every deployment.
    Fixed(String),
}

impl ProjectNaming {
    /// Resolve a name for `source` built from `subdir`.
    pub fn resolve(&self, source: &SourceSpec, subdir: Option<&str>) -> String {
        let raw = match self {
            Self::Fixed(name) => Some(name.clone()),
            Self::Subdirectory => subdir
                .and_then(|s| s.trim_matches('/').rsplit('/').next())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| source.repository_name()),
            Self::Repository => source.repository_name(),
        };

        raw.map(|n| sanitize(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string())
    }
}

/// Lower-case, with anything outside `[a-z0-9-]` replaced by `-`.
pub fn sanitize(name: &str) -> String {
    let mapped: String = name
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_string()
}
