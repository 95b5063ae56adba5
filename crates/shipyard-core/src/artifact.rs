//! Build output collection.
//!
//! Walks the output directory depth-first, visiting entries in
//! lexicographic order so the artifact sequence is deterministic for a given
//! filesystem state. Directories are traversed, never emitted. Symlinks are
//! neither followed nor emitted.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::types::Artifact;

/// Collect every regular file under `project_root/output_directory`.
///
/// Fails with [`PipelineError::OutputMissing`] when the directory does not
/// exist: an absent output after a successful build is an error, never an
/// empty deployment.
///
/// # Example
/// ```no_run
/// use shipyard_core::artifact::collect;
/// use std::path::Path;
///
/// let artifacts = collect(Path::new("/tmp/project"), "dist")?;
/// for artifact in &artifacts {
///     println!("{} ({} bytes)", artifact.relative_path, artifact.content.len());
/// }
/// # Ok::<(), shipyard_core::error::PipelineError>(())
/// ```
pub fn collect(project_root: &Path, output_directory: &str) -> PipelineResult<Vec<Artifact>> {
    let output_dir = project_root.join(output_directory);
    if !output_dir.is_dir() {
        return Err(PipelineError::OutputMissing(PathBuf::from(output_directory)));
    }

    let mut artifacts = Vec::new();
    collect_dir_recursive(&output_dir, "", &mut artifacts)?;
    debug!(
        output = %output_dir.display(),
        count = artifacts.len(),
        "collected build output"
    );
    Ok(artifacts)
}

/// [`collect`] on the blocking thread pool.
pub async fn collect_async(
    project_root: PathBuf,
    output_directory: String,
) -> PipelineResult<Vec<Artifact>> {
    tokio::task::spawn_blocking(move || collect(&project_root, &output_directory))
        .await
        .map_err(|e| PipelineError::Internal(format!("collect task failed: {e}")))?
}

fn collect_dir_recursive(dir: &Path, base: &str, out: &mut Vec<Artifact>) -> PipelineResult<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PipelineError::CollectIo { path, source }
    };

    let entries = fs::read_dir(dir).map_err(io_err(dir))?;
    let mut sorted_entries: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err(dir))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let ty = entry.file_type().map_err(io_err(&path))?;
        if ty.is_dir() {
            collect_dir_recursive(&path, &rel_path, out)?;
        } else if ty.is_file() {
            let content = fs::read(&path).map_err(io_err(&path))?;
            out.push(Artifact::new(rel_path, content));
        } else if ty.is_symlink() {
            // Link targets can sit outside the workspace.
            warn!(path = %path.display(), "skipping symlink in build output");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create_dir_all should succeed in test temp dirs");
        }
        fs::write(path, content).expect("write should succeed in test temp dirs");
    }

    fn paths(artifacts: &[Artifact]) -> Vec<&str> {
        artifacts.iter().map(|a| a.relative_path.as_str()).collect()
    }

    #[test]
    fn collects_flat_and_nested_files() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("dist/a.txt"), b"alpha");
        write_file(&tmp.path().join("dist/sub/b.txt"), b"beta");

        let artifacts = collect(tmp.path(), "dist").expect("collect should succeed");

        assert_eq!(
            artifacts,
            vec![
                Artifact::new("a.txt", b"alpha".to_vec()),
                Artifact::new("sub/b.txt", b"beta".to_vec()),
            ]
        );
    }

    #[test]
    fn empty_output_directory_yields_nothing() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        fs::create_dir_all(tmp.path().join("dist")).expect("create_dir_all should succeed");

        let artifacts = collect(tmp.path(), "dist").expect("collect should succeed");
        assert!(artifacts.is_empty());
    }

    #[test]
    fn missing_output_directory_fails() {
        let tmp = TempDir::new().expect("tempdir should succeed");

        let err = collect(tmp.path(), "dist").unwrap_err();
        assert!(matches!(err, PipelineError::OutputMissing(_)));
        assert_eq!(err.to_string(), "output directory missing: dist");
    }

    #[test]
    fn output_path_that_is_a_file_fails() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("dist"), b"not a dir");

        assert!(matches!(
            collect(tmp.path(), "dist"),
            Err(PipelineError::OutputMissing(_))
        ));
    }

    #[test]
    fn order_is_deterministic_regardless_of_creation_order() {
        let tmp1 = TempDir::new().expect("tempdir should succeed");
        for name in ["c.js", "a.js", "assets/z.css", "assets/b.css", "b.js"] {
            write_file(&tmp1.path().join("out").join(name), name.as_bytes());
        }
        let tmp2 = TempDir::new().expect("tempdir should succeed");
        for name in ["b.js", "assets/b.css", "a.js", "assets/z.css", "c.js"] {
            write_file(&tmp2.path().join("out").join(name), name.as_bytes());
        }

        let first = collect(tmp1.path(), "out").expect("collect should succeed");
        let second = collect(tmp2.path(), "out").expect("collect should succeed");

        assert_eq!(paths(&first), ["a.js", "assets/b.css", "assets/z.css", "b.js", "c.js"]);
        assert_eq!(first, second);
    }

    #[test]
    fn handles_deep_nesting() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let deep = (0..24).map(|i| format!("d{i}")).collect::<Vec<_>>().join("/");
        write_file(&tmp.path().join("dist").join(&deep).join("leaf.bin"), &[0, 159, 255]);

        let artifacts = collect(tmp.path(), "dist").expect("collect should succeed");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].relative_path, format!("{deep}/leaf.bin"));
        assert_eq!(artifacts[0].content, vec![0, 159, 255]);
    }

    #[test]
    fn nested_output_directory_is_stripped() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("build/client/index.html"), b"<html>");

        let artifacts = collect(tmp.path(), "build/client").expect("collect should succeed");
        assert_eq!(paths(&artifacts), ["index.html"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_never_emitted() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("outside-secret.txt"), b"SERVER-SECRET");
        write_file(&tmp.path().join("dist/index.html"), b"<html>");
        std::os::unix::fs::symlink(
            tmp.path().join("outside-secret.txt"),
            tmp.path().join("dist/leak.txt"),
        )
        .expect("symlink should succeed");
        std::os::unix::fs::symlink("../outside-secret.txt", tmp.path().join("dist/relative.txt"))
            .expect("symlink should succeed");
        std::os::unix::fs::symlink(tmp.path().join("dist"), tmp.path().join("dist/loop"))
            .expect("symlink should succeed");

        let artifacts = collect(tmp.path(), "dist").expect("collect should succeed");
        assert_eq!(paths(&artifacts), ["index.html"]);
        assert!(artifacts.iter().all(|a| a.content != b"SERVER-SECRET"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_only_output_is_empty() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("outside-secret.txt"), b"SERVER-SECRET");
        fs::create_dir_all(tmp.path().join("dist")).expect("create_dir_all should succeed");
        std::os::unix::fs::symlink("../outside-secret.txt", tmp.path().join("dist/leak.txt"))
            .expect("symlink should succeed");

        let artifacts = collect(tmp.path(), "dist").expect("collect should succeed");
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn async_collect_matches_sync() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("dist/a.txt"), b"alpha");

        let artifacts = collect_async(tmp.path().to_path_buf(), "dist".to_string())
            .await
            .expect("collect should succeed");
        assert_eq!(paths(&artifacts), ["a.txt"]);
    }
}
