//! `run-command`: spawn a shell command and capture merged output.
//!
//! stdout and stderr are read concurrently and appended in arrival order, so
//! a failing build prints its errors where they happened. The child is
//! killed on timeout, on interrupt, and whenever its future is dropped.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::aliases::{Param, ParameterAliases};
use super::confirm::{format_command_block, Approval};
use super::{CancelSignal, ToolInvocation, ToolResult};
use crate::error::ToolError;

/// Validated `run-command` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgs {
    pub command: String,
    pub description: Option<String>,
    pub timeout: Duration,
}

impl CommandArgs {
    pub fn from_invocation(
        invocation: &ToolInvocation,
        aliases: &ParameterAliases,
        default_timeout: Duration,
    ) -> Result<Self, ToolError> {
        let params = &invocation.parameters;
        let command = aliases
            .lookup_trimmed(params, Param::Command)
            .ok_or_else(|| missing(invocation, "command"))?;
        let timeout = match aliases.lookup_trimmed(params, Param::Timeout) {
            Some(raw) => parse_duration_arg(raw)
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    ToolError::InvalidArguments(format!(
                        "invalid timeout `{raw}`: use seconds or a duration like 500ms, 30s, 2m"
                    ))
                })?,
            None => default_timeout,
        };
        Ok(Self {
            command: command.to_string(),
            description: aliases
                .lookup_trimmed(params, Param::Description)
                .map(str::to_string),
            timeout,
        })
    }

    fn confirmation_text(&self) -> String {
        match &self.description {
            Some(why) => format!("{why}\n{}", format_command_block(&self.command)),
            None => format_command_block(&self.command),
        }
    }
}

fn missing(invocation: &ToolInvocation, name: &str) -> ToolError {
    ToolError::InvalidArguments(format!(
        "missing required parameter `{name}` (received: {})",
        invocation.received_parameters()
    ))
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Interrupted,
}

/// Run `shell -c command` after obtaining approval.
pub async fn run_command(
    args: &CommandArgs,
    shell: &str,
    approval: &Approval<'_>,
    cancel: &CancelSignal,
) -> Result<ToolResult, ToolError> {
    approval.obtain(&args.confirmation_text())?;
    if cancel.is_cancelled() {
        return Err(ToolError::Interrupted(format!(
            "`{}` was not started",
            args.command
        )));
    }

    debug!(command = %args.command, timeout = ?args.timeout, "spawning shell command");
    let mut cmd = Command::new(shell);
    cmd.kill_on_drop(true)
        .arg("-c")
        .arg(&args.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|e| ToolError::ExecutionFailed(format!("{shell}: {e}")))?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, tx.clone()));
    }
    drop(tx);

    let mut output = Vec::new();
    let outcome = tokio::select! {
        status = collect_and_wait(&mut child, &mut rx, &mut output) => Outcome::Exited(status),
        _ = tokio::time::sleep(args.timeout) => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Interrupted,
    };

    match outcome {
        Outcome::Exited(status) => {
            let status =
                status.map_err(|e| ToolError::ExecutionFailed(format!("wait failed: {e}")))?;
            let text = String::from_utf8_lossy(&output).into_owned();
            debug!(code = ?status.code(), bytes = output.len(), "shell command finished");
            Ok(ToolResult::from_exit(status.code(), text))
        }
        stopped => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            while let Ok(chunk) = rx.try_recv() {
                output.extend_from_slice(&chunk);
            }
            let partial = String::from_utf8_lossy(&output).into_owned();
            let error = if matches!(stopped, Outcome::TimedOut) {
                info!(command = %args.command, "shell command timed out");
                ToolError::Timeout(format!(
                    "`{}` after {}",
                    args.command,
                    format_duration(args.timeout)
                ))
            } else {
                info!(command = %args.command, "shell command interrupted");
                ToolError::Interrupted(format!("`{}` was killed", args.command))
            };
            Ok(ToolResult::failure(error).with_output(partial))
        }
    }
}

async fn collect_and_wait(
    child: &mut Child,
    rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    output: &mut Vec<u8>,
) -> std::io::Result<ExitStatus> {
    while let Some(chunk) = rx.recv().await {
        output.extend_from_slice(&chunk);
    }
    child.wait().await
}

async fn pump(mut reader: impl AsyncRead + Unpin, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

/// Parse `30`, `30s`, `500ms`, `2m`, `1h` or `1d`. Bare numbers are seconds.
fn parse_duration_arg(input: &str) -> Option<Duration> {
    let s = input.trim().to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }

    let (digits, unit) = if s.ends_with("ms") {
        (&s[..s.len() - 2], "ms")
    } else if let Some(last) = s.chars().last() {
        if last.is_ascii_alphabetic() {
            (&s[..s.len() - 1], &s[s.len() - 1..])
        } else {
            (s.as_str(), "s")
        }
    } else {
        return None;
    };
    let value = digits.parse::<u64>().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        "d" => value.checked_mul(86_400).map(Duration::from_secs),
        _ => None,
    }
}

/// Human-oriented duration formatting used in error messages.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 {
        return format!("{millis}ms");
    }
    if millis == 0 {
        if secs % 3600 == 0 {
            return format!("{}h", secs / 3600);
        }
        if secs % 60 == 0 {
            return format!("{}m", secs / 60);
        }
        return format!("{secs}s");
    }
    format!("{secs}.{millis:03}s")
}
