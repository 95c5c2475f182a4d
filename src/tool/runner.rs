use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("command timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("command exited with status {}: {}", display_code(.code), .stderr.trim())]
    Failed { code: Option<i32>, stderr: String },

    #[error("failed to run command: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

impl RunError {
    /// True when the executable itself could not be started, as opposed to
    /// the tool running and reporting a remote failure.
    pub fn is_tool_missing(&self) -> bool {
        match self {
            RunError::NotFound { .. } => true,
            RunError::Failed { code, stderr } => {
                // Shell-style "command not found" exit.
                *code == Some(127)
                    || stderr.contains("command not found")
                    || stderr.contains("No such file or directory")
                    || stderr.contains("is not recognized as an internal or external command")
            }
            _ => false,
        }
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// The only door to the outside world: process execution and the two
/// filesystem questions path resolution needs.
///
/// A non-zero exit is reported as [`RunError::Failed`], so callers only
/// ever see successful output in the `Ok` arm.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError>;

    /// Confirm that `path` exists and, off Windows, is executable.
    fn check_executable(&self, path: &Path) -> Result<(), String> {
        let metadata = std::fs::metadata(path)
            .map_err(|_| format!("File does not exist or is not executable: {}", path.display()))?;
        if !metadata.is_file() {
            return Err(format!("Not a file: {}", path.display()));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(format!("File is not executable: {}", path.display()));
            }
        }
        Ok(())
    }

    /// Look `program` up on the search path.
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Runs real child processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    #[instrument(skip(self, args), fields(args = ?args))]
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RunError::NotFound {
                program: program.to_string(),
            },
            _ => RunError::Io(e),
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| RunError::TimedOut {
                timeout_ms: timeout.as_millis() as u64,
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(status = ?output.status.code(), stdout_bytes = stdout.len(), "command finished");

        if !output.status.success() {
            return Err(RunError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_missing_detection() {
        assert!(RunError::NotFound {
            program: "gh".to_string()
        }
        .is_tool_missing());
        assert!(RunError::Failed {
            code: Some(127),
            stderr: String::new()
        }
        .is_tool_missing());
        assert!(RunError::Failed {
            code: Some(1),
            stderr: "sh: gh: command not found".to_string()
        }
        .is_tool_missing());
        assert!(!RunError::Failed {
            code: Some(1),
            stderr: "gh: Not Found (HTTP 404)".to_string()
        }
        .is_tool_missing());
        assert!(!RunError::TimedOut { timeout_ms: 10 }.is_tool_missing());
    }

    #[test]
    fn test_failed_display_includes_stderr() {
        let err = RunError::Failed {
            code: Some(1),
            stderr: "boom\n".to_string(),
        };
        assert_eq!(err.to_string(), "command exited with status 1: boom");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let err = SystemRunner
            .run(
                "gh-linker-definitely-missing-binary",
                &[],
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out() {
        let started = std::time::Instant::now();
        let err = SystemRunner
            .run("sleep", &["5".to_string()], Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::TimedOut { timeout_ms: 200 }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failed_with_stderr() {
        let err = SystemRunner
            .run(
                "sh",
                &["-c".to_string(), "echo nope >&2; exit 3".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        match err {
            RunError::Failed { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_executable_rejects_missing_file() {
        let err = SystemRunner
            .check_executable(Path::new("/definitely/not/here/gh"))
            .unwrap_err();
        assert!(err.contains("does not exist"));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_executable_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gh");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(SystemRunner.check_executable(&path).is_err());

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(SystemRunner.check_executable(&path).is_ok());
    }
}
