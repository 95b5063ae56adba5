//! Per-attempt scratch directories.
//!
//! Every deployment attempt gets a fresh directory under the manager's root,
//! named by a random v4 UUID and created with `create_dir` (never
//! `create_dir_all`) so two attempts can never share one. Each acquired
//! [`Workspace`] is released exactly once: explicitly through
//! [`WorkspaceManager::release`], or by its `Drop` impl if the attempt was
//! abandoned before reaching that point.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CleanupError, PipelineError, PipelineResult};

const MAX_ALLOCATION_ATTEMPTS: usize = 8;

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    cleanup_failures: AtomicU64,
}

/// Snapshot of workspace lifecycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkspaceStats {
    pub acquired: u64,
    pub released: u64,
    pub cleanup_failures: u64,
}

impl WorkspaceStats {
    /// Workspaces acquired but not yet released.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Allocates and tears down workspaces under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    counters: Arc<Counters>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named workspace directory.
    pub async fn acquire(&self) -> PipelineResult<Workspace> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(PipelineError::Workspace)?;

        let mut last_err = None;
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let id = Uuid::new_v4();
            let path = self.root.join(format!("attempt-{}", id.simple()));
            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    self.counters.acquired.fetch_add(1, Ordering::SeqCst);
                    debug!(workspace = %id, path = %path.display(), "workspace acquired");
                    return Ok(Workspace {
                        id,
                        root_path: path,
                        created_at: Utc::now(),
                        released: false,
                        counters: Arc::clone(&self.counters),
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => last_err = Some(err),
                Err(err) => return Err(PipelineError::Workspace(err)),
            }
        }
        Err(PipelineError::Workspace(last_err.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::AlreadyExists, "workspace name collision")
        })))
    }

    /// Recursively delete the workspace.
    ///
    /// A directory that is already gone counts as released.
    pub async fn release(&self, mut workspace: Workspace) -> Result<(), CleanupError> {
        workspace.released = true;
        self.counters.released.fetch_add(1, Ordering::SeqCst);

        match tokio::fs::remove_dir_all(&workspace.root_path).await {
            Ok(()) => {
                debug!(workspace = %workspace.id, "workspace released");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => {
                self.counters.cleanup_failures.fetch_add(1, Ordering::SeqCst);
                Err(CleanupError {
                    path: workspace.root_path.clone(),
                    source,
                })
            }
        }
    }

    pub fn stats(&self) -> WorkspaceStats {
        WorkspaceStats {
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
            cleanup_failures: self.counters.cleanup_failures.load(Ordering::SeqCst),
        }
    }
}

/// An isolated directory owned by exactly one pipeline run.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    root_path: PathBuf,
    created_at: DateTime<Utc>,
    released: bool,
    counters: Arc<Counters>,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.root_path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Drop for Workspace {
    /// Removes the directory of an attempt that never reached
    /// [`WorkspaceManager::release`]. Inside a runtime the removal runs on the
    /// blocking pool so a large tree does not stall a worker thread; without
    /// one it happens inline.
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        warn!(workspace = %self.id, "workspace dropped without release, removing");

        let id = self.id;
        let path = std::mem::take(&mut self.root_path);
        let counters = Arc::clone(&self.counters);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(id, &path, &counters));
            }
            Err(_) => remove_abandoned(id, &path, &counters),
        }
    }
}

fn remove_abandoned(id: Uuid, path: &Path, counters: &Counters) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(workspace = %id, "abandoned workspace removed"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            counters.cleanup_failures.fetch_add(1, Ordering::SeqCst);
            warn!(
                workspace = %id,
                path = %path.display(),
                error = %err,
                "failed to remove abandoned workspace"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[tokio::test]
    async fn acquire_creates_directory_under_root() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let manager = WorkspaceManager::new(tmp.path().join("workspaces"));

        let workspace = manager.acquire().await.expect("acquire should succeed");
        assert!(workspace.path().is_dir());
        assert!(workspace.path().starts_with(manager.root()));

        manager.release(workspace).await.expect("release should succeed");
        assert_eq!(manager.stats().outstanding(), 0);
    }

    #[tokio::test]
    async fn release_removes_nested_content() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let manager = WorkspaceManager::new(tmp.path());

        let workspace = manager.acquire().await.expect("acquire should succeed");
        let nested = workspace.path().join("node_modules").join("pkg");
        std::fs::create_dir_all(&nested).expect("create_dir_all should succeed");
        std::fs::write(nested.join("index.js"), "x").expect("write should succeed");
        let path = workspace.path().to_path_buf();

        manager.release(workspace).await.expect("release should succeed");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_tolerates_missing_directory() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let manager = WorkspaceManager::new(tmp.path());

        let workspace = manager.acquire().await.expect("acquire should succeed");
        std::fs::remove_dir_all(workspace.path()).expect("remove should succeed");

        manager
            .release(workspace)
            .await
            .expect("release of a vanished workspace should succeed");
        let stats = manager.stats();
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.cleanup_failures, 0);
    }

    #[tokio::test]
    async fn concurrent_acquisitions_are_distinct() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let manager = WorkspaceManager::new(tmp.path());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire().await })
            })
            .collect();

        let mut workspaces = Vec::new();
        for handle in handles {
            workspaces.push(
                handle
                    .await
                    .expect("task should not panic")
                    .expect("acquire should succeed"),
            );
        }

        let paths: HashSet<_> = workspaces.iter().map(|w| w.path().to_path_buf()).collect();
        assert_eq!(paths.len(), 32);

        for workspace in workspaces {
            manager.release(workspace).await.expect("release should succeed");
        }
        assert_eq!(manager.stats().outstanding(), 0);
    }

    async fn wait_until_removed(path: &Path) -> bool {
        for _ in 0..250 {
            if !path.exists() {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn dropped_workspace_is_removed_off_the_worker() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let manager = WorkspaceManager::new(tmp.path());

        let workspace = manager.acquire().await.expect("acquire should succeed");
        let path = workspace.path().to_path_buf();
        std::fs::create_dir_all(path.join("node_modules/pkg")).expect("create_dir_all should succeed");
        drop(workspace);

        assert_eq!(manager.stats().released, 1);
        assert!(wait_until_removed(&path).await);
        assert_eq!(manager.stats().cleanup_failures, 0);
    }

    #[test]
    fn dropped_workspace_without_runtime_is_removed_inline() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let manager = WorkspaceManager::new(tmp.path());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime should build");

        let workspace = runtime
            .block_on(manager.acquire())
            .expect("acquire should succeed");
        let path = workspace.path().to_path_buf();
        drop(runtime);
        drop(workspace);

        assert!(!path.exists());
        assert_eq!(manager.stats().outstanding(), 0);
    }
}
