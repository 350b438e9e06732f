//! Plain (non-PTY) execution for non-interactive commands.

use std::process::Stdio;
use std::time::Duration;

use crate::error::{ExecError, Result};

/// Conventional exit code for a timed-out command.
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Outcome of a plain captured execution.
#[derive(Debug, Clone)]
pub struct PlainOutcome {
    /// Combined stdout and stderr.
    pub output: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub timed_out: bool,
}

/// Run a command through the user's shell, capturing stdout and stderr.
///
/// No terminal is involved: stdin is closed, and an optional timeout kills
/// the child outright (there is no quit-keystroke cascade without a PTY).
pub async fn execute_plain(command: &str, timeout: Option<Duration>) -> Result<PlainOutcome> {
    let start = std::time::Instant::now();
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());

    let mut cmd = tokio::process::Command::new(&shell);
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ExecError::Spawn(format!("failed to spawn '{command}': {e}")))?;

    let wait = child.wait_with_output();
    let output = match timeout {
        None => wait.await?,
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(result) => result?,
            Err(_) => {
                // Dropping the wait future reaps the child via kill_on_drop.
                tracing::debug!(command, timeout_ms = limit.as_millis() as u64, "plain execution timed out");
                return Ok(PlainOutcome {
                    output: String::new(),
                    exit_code: TIMEOUT_EXIT_CODE,
                    duration: start.elapsed(),
                    timed_out: true,
                });
            }
        },
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(PlainOutcome {
        output: text,
        exit_code: output.status.code().unwrap_or(-1),
        duration: start.elapsed(),
        timed_out: false,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let outcome = execute_plain("echo hello", None).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.output.contains("hello"));
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_captures_stderr_too() {
        let outcome = execute_plain("echo oops >&2", None).await.unwrap();
        assert!(outcome.output.contains("oops"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_code_is_not_an_error() {
        let outcome = execute_plain("exit 7", None).await.unwrap();
        assert_eq!(outcome.exit_code, 7);
    }

    #[tokio::test]
    async fn test_timeout_kills_and_reports_124() {
        let outcome = execute_plain("sleep 30", Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, 124);
        assert!(outcome.duration < Duration::from_secs(5));
    }
}
