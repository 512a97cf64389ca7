//! External tool invocation.
//!
//! Repository mirroring shells out to `git`; this wraps the spawn, captures
//! output, and turns non-zero exits into typed errors with the tail of
//! stderr attached.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {code}: {stderr_tail}")]
    NonZeroExit {
        tool: String,
        code: i32,
        stderr_tail: String,
    },

    #[error("{tool} terminated by signal")]
    Killed { tool: String },

    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },
}

/// A named executable invoked with per-call arguments.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: String,
    timeout: Duration,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Run to completion, capturing stdout and stderr. Success is exit
    /// status zero; anything else is an error carrying the stderr tail.
    pub async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<String, ProcessError> {
        debug!(tool = %self.program, ?args, "running external tool");
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.output();
        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ProcessError::Spawn {
                    tool: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProcessError::Timeout {
                    tool: self.program.clone(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        match output.status.code() {
            Some(code) => Err(ProcessError::NonZeroExit {
                tool: self.program.clone(),
                code,
                stderr_tail: stderr_tail(&output.stderr),
            }),
            None => Err(ProcessError::Killed {
                tool: self.program.clone(),
            }),
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let start = trimmed.len() - STDERR_TAIL_BYTES;
    // Avoid splitting a UTF-8 sequence mid-character.
    let boundary = (start..trimmed.len())
        .find(|i| trimmed.is_char_boundary(*i))
        .unwrap_or(trimmed.len());
    trimmed[boundary..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(program: &str) -> ExternalTool {
        ExternalTool::new(program, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_successful_run_captures_stdout() {
        let out = tool("echo").run(&["hello"], None).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_code() {
        let err = tool("false").run(&[], None).await.unwrap_err();
        match err {
            ProcessError::NonZeroExit { code, .. } => assert_eq!(code, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = tool("snapvault-no-such-binary")
            .run(&[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let slow = ExternalTool::new("sleep", Duration::from_millis(50));
        let err = slow.run(&["5"], None).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }

    #[test]
    fn test_stderr_tail_truncates() {
        let long = "x".repeat(STDERR_TAIL_BYTES + 100);
        assert_eq!(stderr_tail(long.as_bytes()).len(), STDERR_TAIL_BYTES);
    }
}
