//! Stage runner: execute one external command with bounded output capture.
//!
//! The runner never decides whether a failure is fatal. It reports what
//! happened in a [`StageResult`] and leaves the decision to the caller.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ENV_DEPLOY_TOKEN;

/// Default cap on combined stdout and stderr.
pub const DEFAULT_OUTPUT_CAP: usize = 10 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// A command line to run in a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageCommand {
    /// Interpreted by the platform shell (`sh -c` / `cmd /C`).
    Shell(String),
    /// Executed directly, no shell involved.
    Exec { program: String, args: Vec<String> },
}

impl StageCommand {
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell(command.into())
    }

    pub fn exec(program: impl Into<String>, args: Vec<String>) -> Self {
        Self::Exec {
            program: program.into(),
            args,
        }
    }

    fn to_command(&self) -> Command {
        match self {
            Self::Shell(line) => {
                #[cfg(windows)]
                {
                    let mut cmd = Command::new("cmd");
                    cmd.arg("/C").arg(line);
                    cmd
                }
                #[cfg(not(windows))]
                {
                    let mut cmd = Command::new("sh");
                    cmd.arg("-c").arg(line);
                    cmd
                }
            }
            Self::Exec { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        }
    }
}

impl std::fmt::Display for StageCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shell(line) => write!(f, "{line}"),
            // Arguments may carry credentials.
            Self::Exec { program, args } => write!(f, "{program} ({} args)", args.len()),
        }
    }
}

/// What a stage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    pub exited_ok: bool,
    pub stdout: String,
    pub stderr: String,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Process-level failure (spawn error, output cap) if any.
    pub message: Option<String>,
}

impl StageResult {
    fn process_failure(message: String) -> Self {
        Self {
            exited_ok: false,
            message: Some(message),
            ..Self::default()
        }
    }

    /// Best description of why the stage failed: stderr when there is any,
    /// otherwise the process failure message.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        if let Some(message) = &self.message {
            return message.clone();
        }
        match self.exit_code {
            Some(code) => format!("process exited with status {code}"),
            None => "process terminated by signal".to_string(),
        }
    }
}

/// Runs external commands to completion or to the output cap.
#[derive(Debug, Clone)]
pub struct StageRunner {
    output_cap: usize,
}

impl Default for StageRunner {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_CAP)
    }
}

impl StageRunner {
    pub fn new(output_cap: usize) -> Self {
        Self { output_cap }
    }

    pub fn output_cap(&self) -> usize {
        self.output_cap
    }

    /// Run `command` in `cwd` and wait for it.
    ///
    /// The child is killed if this future is dropped, so an enclosing
    /// timeout cancels the stage mid-flight. The server's deploy token is
    /// removed from the inherited environment; `env` entries are applied
    /// after that and may set it again.
    pub async fn run(
        &self,
        command: &StageCommand,
        cwd: &Path,
        env: &[(String, String)],
    ) -> StageResult {
        let mut cmd = command.to_command();
        cmd.current_dir(cwd)
            .env_remove(ENV_DEPLOY_TOKEN)
            .env("CI", "1")
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %command, cwd = %cwd.display(), "starting stage command");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                return StageResult::process_failure(format!(
                    "failed to start `{command}`: {err}"
                ));
            }
        };

        let total = Arc::new(AtomicUsize::new(0));
        let overflow = CancellationToken::new();
        let stdout_task = tokio::spawn(drain(
            child.stdout.take(),
            Arc::clone(&total),
            self.output_cap,
            overflow.clone(),
        ));
        let stderr_task = tokio::spawn(drain(
            child.stderr.take(),
            Arc::clone(&total),
            self.output_cap,
            overflow.clone(),
        ));

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = overflow.cancelled() => {
                warn!(command = %command, cap = self.output_cap, "output cap exceeded, killing process");
                let _ = child.kill().await;
                None
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let mut result = StageResult {
            exited_ok: false,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: None,
            message: None,
        };

        match status {
            Some(Ok(status)) => {
                result.exit_code = status.code();
                result.exited_ok = status.success();
            }
            Some(Err(err)) => {
                result.message = Some(format!("failed to wait for `{command}`: {err}"));
            }
            None => {}
        }

        if overflow.is_cancelled() {
            result.exited_ok = false;
            result.message = Some(format!(
                "output of `{command}` exceeded {} bytes",
                self.output_cap
            ));
        }

        result
    }
}

/// Read a pipe to EOF, stopping once the shared byte budget is spent.
async fn drain<R>(
    reader: Option<R>,
    total: Arc<AtomicUsize>,
    cap: usize,
    overflow: CancellationToken,
) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    let mut captured = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = tokio::select! {
            read = reader.read(&mut chunk) => match read {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            },
            _ = overflow.cancelled() => break,
        };

        let before = total.fetch_add(n, Ordering::SeqCst);
        let room = cap.saturating_sub(before);
        captured.extend_from_slice(&chunk[..n.min(room)]);
        if before + n > cap {
            overflow.cancel();
            break;
        }
    }

    captured
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn captures_stdout_of_successful_command() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let runner = StageRunner::default();

        let result = runner
            .run(&StageCommand::shell("echo hello"), tmp.path(), &[])
            .await;

        assert!(result.exited_ok);
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn failure_detail_prefers_stderr() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let runner = StageRunner::default();

        let result = runner
            .run(
                &StageCommand::shell("echo partial; echo 'build exploded' >&2; exit 3"),
                tmp.path(),
                &[],
            )
            .await;

        assert!(!result.exited_ok);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.failure_detail(), "build exploded");
    }

    #[tokio::test]
    async fn failure_detail_falls_back_to_exit_status() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let result = StageRunner::default()
            .run(&StageCommand::shell("exit 7"), tmp.path(), &[])
            .await;

        assert_eq!(result.failure_detail(), "process exited with status 7");
    }

    #[tokio::test]
    async fn missing_program_is_a_failed_result() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let result = StageRunner::default()
            .run(
                &StageCommand::exec("definitely-not-a-real-binary-4821", vec![]),
                tmp.path(),
                &[],
            )
            .await;

        assert!(!result.exited_ok);
        assert!(result.failure_detail().contains("failed to start"));
    }

    #[tokio::test]
    async fn runs_in_working_directory_with_env() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        std::fs::write(tmp.path().join("marker.txt"), "present").expect("write should succeed");

        let result = StageRunner::default()
            .run(
                &StageCommand::shell("cat marker.txt; printf ' %s %s' \"$GREETING\" \"$CI\""),
                tmp.path(),
                &[("GREETING".to_string(), "hi".to_string())],
            )
            .await;

        assert!(result.exited_ok);
        assert_eq!(result.stdout, "present hi 1");
    }

    #[tokio::test]
    async fn server_deploy_token_is_not_inherited() {
        // SAFETY: no other test in this crate reads this variable from the
        // process environment.
        unsafe { std::env::set_var(ENV_DEPLOY_TOKEN, "server-secret") };
        let tmp = TempDir::new().expect("tempdir should succeed");
        let line = format!("printf '%s' \"${{{ENV_DEPLOY_TOKEN}-unset}}\"");

        let hidden = StageRunner::default()
            .run(&StageCommand::shell(line.as_str()), tmp.path(), &[])
            .await;
        let explicit = StageRunner::default()
            .run(
                &StageCommand::shell(line.as_str()),
                tmp.path(),
                &[(ENV_DEPLOY_TOKEN.to_string(), "per-request".to_string())],
            )
            .await;
        unsafe { std::env::remove_var(ENV_DEPLOY_TOKEN) };

        assert_eq!(hidden.stdout, "unset");
        assert_eq!(explicit.stdout, "per-request");
    }

    #[tokio::test]
    async fn output_cap_stops_runaway_process() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let runner = StageRunner::new(1024);

        let result = runner
            .run(&StageCommand::shell("yes shipyard"), tmp.path(), &[])
            .await;

        assert!(!result.exited_ok);
        assert!(result.stdout.len() <= 1024);
        assert!(
            result
                .message
                .as_deref()
                .is_some_and(|m| m.contains("exceeded 1024 bytes"))
        );
    }

    #[test]
    fn exec_display_hides_arguments() {
        let command = StageCommand::exec("vercel", vec!["--token".into(), "secret".into()]);
        assert_eq!(command.to_string(), "vercel (2 args)");
    }
}
