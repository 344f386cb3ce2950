//! Drives the external module runtime as a child process: one invocation
//! per Sandbox operation, stdout parsed as newline-delimited JSON, stderr
//! folded into the error on non-zero exit.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// One NDJSON message emitted by the runtime in `-json` mode. The concrete
/// shape varies by subcommand; everything not recognized as a log line is
/// treated as (part of) the final structured result.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuntimeMessage {
    Log {
        #[serde(rename = "@level")]
        level: String,
        #[serde(rename = "@message")]
        message: String,
    },
    Other(Json),
}

/// The outcome of running one subcommand to completion: the concatenated
/// non-log NDJSON messages (the final result, if the subcommand produces
/// one) and whether the process exited cleanly.
pub struct ExecutionOutcome {
    pub exit_success: bool,
    pub result_messages: Vec<Json>,
    pub stderr: String,
}

/// Run `executor <subcommand> <extra_args...> -json` with `cwd` as the
/// working directory, streaming stdout as NDJSON and forwarding log lines
/// to `tracing` at the level the runtime reports.
pub async fn run_subcommand(
    executor: &Path,
    subcommand: &str,
    extra_args: &[&str],
    cwd: &Path,
) -> Result<ExecutionOutcome> {
    let mut command = Command::new(executor);
    command
        .arg(subcommand)
        .args(extra_args)
        .arg("-json")
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning {} {subcommand}", executor.display()))?;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let mut result_messages = Vec::new();
    let mut stdout_lines = BufReader::new(stdout).lines();
    while let Some(line) = stdout_lines
        .next_line()
        .await
        .context("reading runtime stdout")?
    {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RuntimeMessage>(&line) {
            Ok(RuntimeMessage::Log { level, message }) => forward_log(&level, &message),
            Ok(RuntimeMessage::Other(value)) => result_messages.push(value),
            Err(_) => debug!(raw = %line, "unparseable runtime stdout line, ignoring"),
        }
    }

    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut stderr_buf = String::new();
    while let Some(line) = stderr_lines
        .next_line()
        .await
        .context("reading runtime stderr")?
    {
        stderr_buf.push_str(&line);
        stderr_buf.push('\n');
    }

    let status = child.wait().await.context("waiting on runtime process")?;
    let exit_success = status.success();
    if !exit_success {
        for line in stderr_buf.lines() {
            warn!(runtime_stderr = %line, "{subcommand} reported a warning/error line");
        }
    }

    Ok(ExecutionOutcome {
        exit_success,
        result_messages,
        stderr: stderr_buf,
    })
}

/// Write `bytes` to `path`, used by push/pull-state operations to hand raw
/// state/lock payloads to and from the runtime's own storage convention.
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

fn forward_log(level: &str, message: &str) {
    match level {
        "trace" => tracing::trace!(runtime = true, "{message}"),
        "debug" => tracing::debug!(runtime = true, "{message}"),
        "warn" => tracing::warn!(runtime = true, "{message}"),
        "error" => tracing::error!(runtime = true, "{message}"),
        _ => tracing::info!(runtime = true, "{message}"),
    }
}

/// A non-zero exit with no parsed result is an outright operation failure.
pub fn require_result(outcome: &ExecutionOutcome, subcommand: &str) -> Result<()> {
    if !outcome.exit_success && outcome.result_messages.is_empty() {
        bail!(
            "{subcommand} exited with a failure and produced no result: {}",
            outcome.stderr.trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_result_rejects_bare_failure() {
        let outcome = ExecutionOutcome {
            exit_success: false,
            result_messages: vec![],
            stderr: "boom".to_string(),
        };
        assert!(require_result(&outcome, "apply").is_err());
    }

    #[test]
    fn require_result_accepts_failure_with_partial_result() {
        let outcome = ExecutionOutcome {
            exit_success: false,
            result_messages: vec![serde_json::json!({"type": "apply_complete"})],
            stderr: "boom".to_string(),
        };
        assert!(require_result(&outcome, "apply").is_ok());
    }

    #[tokio::test]
    async fn run_subcommand_reports_clean_exit_for_true() {
        let outcome = run_subcommand(Path::new("true"), "noop", &[], Path::new("."))
            .await
            .unwrap();
        assert!(outcome.exit_success);
    }

    #[tokio::test]
    async fn run_subcommand_reports_failure_for_false() {
        let outcome = run_subcommand(Path::new("false"), "noop", &[], Path::new("."))
            .await
            .unwrap();
        assert!(!outcome.exit_success);
    }
}
