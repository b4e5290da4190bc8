//! External command execution with timeouts
//!
//! Every tool rmbench drives (terraform, ssh, scp, git) goes through
//! [`run_command`], which streams output lines to tracing while capturing
//! them for the caller. A cancelled command is sent SIGINT and given time to
//! exit on its own; only a timeout kills it outright.

use anyhow::{Context, Result};
use rmbench_common::defaults::DEFAULT_INTERRUPT_GRACE;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of stderr lines kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Command timeout (kills process if exceeded)
    pub timeout: Duration,
    /// Time to wait for output readers after the process exits
    pub stream_flush_timeout: Duration,
    /// Re-emit output lines as debug events
    pub log_output: bool,
    /// Interrupt the process when this token fires
    pub cancel: Option<CancellationToken>,
    /// How long an interrupted process may take to exit before it is killed
    pub interrupt_grace: Duration,
}

impl CommandConfig {
    /// Create with custom timeout, default stream flush timeout
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            stream_flush_timeout: Duration::from_secs(5),
            log_output: true,
            cancel: None,
            interrupt_grace: Duration::from_secs(DEFAULT_INTERRUPT_GRACE),
        }
    }

    /// Interrupt the process when `cancel` fires
    pub fn cancellable(mut self, cancel: &CancellationToken) -> Self {
        self.cancel = Some(cancel.clone());
        self
    }

    /// Capture output without logging it (e.g. `terraform output -json`)
    pub fn quiet(mut self) -> Self {
        self.log_output = false;
        self
    }
}

/// What to run
#[derive(Debug, Clone, Default)]
pub struct CommandSpec<'a> {
    pub program: &'a str,
    pub args: Vec<String>,
    /// Extra environment variables (values are never logged)
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<&'a Path>,
}

impl<'a> CommandSpec<'a> {
    pub fn new(program: &'a str) -> Self {
        Self {
            program,
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, envs: &[(String, String)]) -> Self {
        self.envs.extend_from_slice(envs);
        self
    }

    pub fn current_dir(mut self, dir: &'a Path) -> Self {
        self.current_dir = Some(dir);
        self
    }

    /// Human readable form for logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last lines of stderr, for error messages
    pub fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }
}

/// Run a command, streaming its output to tracing and capturing it.
///
/// # Returns
/// * `Ok(output)` once the process exits, whatever its exit status
/// * `Err` if timeout, cancellation, spawn failure, or other error
pub async fn run_command(spec: &CommandSpec<'_>, config: &CommandConfig) -> Result<CommandOutput> {
    if config.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
        anyhow::bail!("Command '{}' cancelled before it started", spec.display());
    }

    info!(
        cmd = %spec.program,
        args = ?spec.args,
        timeout_secs = config.timeout.as_secs(),
        "Running command"
    );

    let mut command = Command::new(spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.envs {
        command.env(key, value);
    }
    if let Some(dir) = spec.current_dir {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn command: {}", spec.program))?;

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;

    let log_output = config.log_output;
    let program = spec.program.to_string();
    let stdout_handle = tokio::spawn(collect_lines(stdout, program.clone(), "stdout", log_output));
    let stderr_handle = tokio::spawn(collect_lines(stderr, program, "stderr", log_output));

    let waited = tokio::select! {
        waited = tokio::time::timeout(config.timeout, child.wait()) => Some(waited),
        _ = cancelled(config.cancel.as_ref()) => None,
    };
    let status = match waited {
        Some(Ok(Ok(status))) => status,
        Some(Ok(Err(e))) => return Err(e).context("Failed waiting for command"),
        None => {
            warn!(
                cmd = %spec.program,
                grace_secs = config.interrupt_grace.as_secs(),
                "Cancelled, interrupting process"
            );
            interrupt_and_wait(&mut child, config.interrupt_grace).await;
            anyhow::bail!("Command '{}' cancelled", spec.display());
        }
        Some(Err(_)) => {
            warn!(
                cmd = %spec.program,
                timeout_secs = config.timeout.as_secs(),
                "Command timed out, killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed-out process");
            }
            anyhow::bail!(
                "Command '{}' timed out after {}s",
                spec.display(),
                config.timeout.as_secs()
            );
        }
    };

    let stdout = tokio::time::timeout(config.stream_flush_timeout, stdout_handle)
        .await
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or_default();
    let stderr = tokio::time::timeout(config.stream_flush_timeout, stderr_handle)
        .await
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or_default();

    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

/// Run a command and fail unless it exits successfully
pub async fn run_checked(spec: &CommandSpec<'_>, config: &CommandConfig) -> Result<CommandOutput> {
    let output = run_command(spec, config).await?;
    if !output.success {
        anyhow::bail!(
            "Command '{}' failed with exit code {:?}:\n{}",
            spec.display(),
            output.code,
            output.stderr_tail()
        );
    }
    Ok(output)
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Send SIGINT, then kill the process if it outlives `grace`
async fn interrupt_and_wait(child: &mut Child, grace: Duration) {
    send_interrupt(child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(?status, "Interrupted process exited"),
        Ok(Err(e)) => warn!(error = %e, "Failed waiting for interrupted process"),
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "Interrupted process did not exit in time, killing it"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill interrupted process");
            }
        }
    }
}

#[cfg(unix)]
fn send_interrupt(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        warn!(pid, error = %e, "Failed to send SIGINT");
    }
}

#[cfg(not(unix))]
fn send_interrupt(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to stop process");
    }
}

async fn collect_lines<R>(reader: R, program: String, stream: &'static str, log: bool) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if log {
            debug!(cmd = %program, stream, "{}", line);
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_echo() {
        let spec = CommandSpec::new("echo").arg("hello");
        let output = run_command(&spec, &CommandConfig::with_timeout_secs(10))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.code, Some(0));
        assert_eq!(output.stdout, "hello\n");
    }

    #[tokio::test]
    async fn test_run_command_failure() {
        let spec = CommandSpec::new("false");
        let output = run_command(&spec, &CommandConfig::with_timeout_secs(10))
            .await
            .unwrap();
        assert!(!output.success);

        let err = run_checked(&spec, &CommandConfig::with_timeout_secs(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Command 'false' failed"));
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let spec = CommandSpec::new("this-command-does-not-exist-12345");
        let result = run_command(&spec, &CommandConfig::with_timeout_secs(10)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let spec = CommandSpec::new("sleep").arg("5");
        let err = run_command(&spec, &CommandConfig::with_timeout_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_interrupts_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("interrupted");
        let script = format!(
            "trap 'echo INT > {}; exit 130' INT; while true; do sleep 0.1; done",
            marker.display()
        );
        let spec = CommandSpec::new("sh").args(["-c", script.as_str()]);

        let cancel = CancellationToken::new();
        let config = CommandConfig::with_timeout_secs(30).cancellable(&cancel);
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let err = run_command(&spec, &config).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "INT");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_process_ignoring_interrupt() {
        let spec = CommandSpec::new("sh").args(["-c", "trap '' INT; sleep 5"]);
        let cancel = CancellationToken::new();
        let mut config = CommandConfig::with_timeout_secs(60).cancellable(&cancel);
        config.interrupt_grace = Duration::from_millis(200);
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = run_command(&spec, &config).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_cancelled_command_never_starts() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = CommandConfig::with_timeout_secs(10).cancellable(&cancel);
        let err = run_command(&CommandSpec::new("true"), &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled before it started"));
    }

    #[tokio::test]
    async fn test_run_command_env_and_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo $RMBENCH_TEST_VAR; pwd; echo oops >&2"])
            .envs(&[("RMBENCH_TEST_VAR".to_string(), "value".to_string())])
            .current_dir(dir.path());
        let output = run_command(&spec, &CommandConfig::with_timeout_secs(10).quiet())
            .await
            .unwrap();
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("value"));
        let pwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(
            pwd.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
        assert_eq!(output.stderr_tail(), "oops");
    }
}
