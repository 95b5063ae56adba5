//! Source location types.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

const GITHUB_URL_PREFIX: &str = "https://github.com/";

/// A parsed repository location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Clone URL or local path (e.g., "https://github.com/org/repo")
    pub repo_url: String,
    /// Git reference to check out (branch, tag, or commit SHA)
    pub reference: Option<String>,
    /// Subdirectory embedded in the source location
    pub subdir: Option<String>,
}

impl SourceSpec {
    /// Create a spec for a plain clone URL.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            reference: None,
            subdir: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = Some(subdir.into());
        self
    }

    /// Parse a source location.
    ///
    /// Supports formats:
    /// - `https://github.com/org/repo.git` (or any clone URL / local path)
    /// - `git:https://example.com/repo.git`
    /// - `github:org/repo`
    /// - `github:org/repo@ref`
    /// - `github:org/repo@ref/path`
    /// - `https://github.com/org/repo/tree/ref/path`
    ///
    /// The `/tree/` form is only recognized on GitHub URLs; other hosts and
    /// local paths are taken verbatim.
    pub fn parse(source: &str) -> PipelineResult<Self> {
        let source = source.trim();
        let raw = match source.strip_prefix("git:") {
            Some(rest) if !rest.starts_with("//") => rest,
            _ => source,
        };
        let raw = if let Some(stripped) = raw.strip_prefix("github:") {
            if stripped.split('@').next().is_none_or(|r| r.split('/').count() != 2) {
                return Err(PipelineError::validation(format!(
                    "Invalid GitHub shorthand: {source}"
                )));
            }
            Self::expand_github_shorthand(stripped)
        } else {
            raw.to_string()
        };

        if raw.is_empty() {
            return Err(PipelineError::validation("sourceUrl is empty"));
        }

        if let Some((url_part, reference)) = raw.split_once("#ref=") {
            return Ok(Self::new(url_part).with_reference(reference));
        }

        if let Some((repo, reference, subdir)) = Self::split_tree_path(&raw) {
            let mut spec = Self::new(repo).with_reference(reference);
            let subdir = subdir.trim_matches('/');
            if !subdir.is_empty() {
                spec = spec.with_subdir(subdir);
            }
            return Ok(spec);
        }

        Ok(Self::new(raw))
    }

    /// Expand github shorthand like "org/repo@ref/path" to a full URL.
    fn expand_github_shorthand(shorthand: &str) -> String {
        if let Some((repo_part, rest)) = shorthand.split_once('@') {
            if let Some((reference, path)) = rest.split_once('/') {
                format!("https://github.com/{repo_part}/tree/{reference}/{path}")
            } else {
                format!("https://github.com/{repo_part}#ref={rest}")
            }
        } else {
            format!("https://github.com/{shorthand}")
        }
    }

    /// Split a GitHub URL with /tree/ pattern into (repo, ref, subdir).
    fn split_tree_path(raw: &str) -> Option<(String, String, String)> {
        let path = raw.strip_prefix(GITHUB_URL_PREFIX)?;
        let marker = "/tree/";
        let idx = path.find(marker)?;
        let repo = format!("{GITHUB_URL_PREFIX}{}", &path[..idx]);
        let rest = &path[idx + marker.len()..];
        let mut parts = rest.splitn(2, '/');
        let reference = parts.next().filter(|r| !r.is_empty())?.to_string();
        let subdir = parts.next().unwrap_or("").to_string();
        Some((repo, reference, subdir))
    }

    /// Repository name: last path segment with any `.git` suffix removed.
    pub fn repository_name(&self) -> Option<String> {
        let trimmed = self
            .repo_url
            .trim_end_matches(['/', '\\'])
            .trim_end_matches(".git");
        let name = trimmed
            .rsplit(['/', '\\', ':'])
            .next()
            .filter(|s| !s.is_empty())?;
        Some(name.to_string())
    }
}
