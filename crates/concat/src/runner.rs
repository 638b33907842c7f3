//! Command runner for external transcoding tools.
//!
//! Every invocation of ffmpeg or ffprobe goes through a [`CommandExecutor`].
//! Expected failure modes (spawn failure, non-zero exit, timeout) are reported
//! through [`CommandOutcome`] rather than as errors.

use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

/// Default pause between a timed out attempt and the next one.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Result of running an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the command exited with status zero.
    pub success: bool,
    /// Stdout on success; stdout and stderr combined on failure.
    pub output: String,
}

impl CommandOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Per-attempt time limit and retry count for one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub timeout: Duration,
    pub retries: u32,
}

impl RunLimits {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }
}

/// Something that can run an external command with a timeout and retries.
///
/// The pipeline is generic over this trait so tests can substitute a fake
/// toolchain for ffmpeg/ffprobe.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor {
    /// Runs `command`, waiting at most `timeout` per attempt. A timed out
    /// attempt is retried up to `retries` additional times.
    async fn run(&self, command: Command, timeout: Option<Duration>, retries: u32)
        -> CommandOutcome;
}

/// Renders a command as a single line for logs.
pub fn describe_command(command: &Command) -> String {
    let mut line = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        let arg = arg.to_string_lossy();
        line.push(' ');
        if arg.contains(' ') || arg.is_empty() {
            line.push('"');
            line.push_str(&arg);
            line.push('"');
        } else {
            line.push_str(&arg);
        }
    }
    line
}

/// Executor backed by real child processes.
///
/// Children are spawned with kill-on-drop, so a child still running when its
/// handle goes away (timeout, error, unwinding) is terminated.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    backoff: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl ProcessRunner {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }
}

impl CommandExecutor for ProcessRunner {
    async fn run(
        &self,
        command: Command,
        timeout: Option<Duration>,
        retries: u32,
    ) -> CommandOutcome {
        let line = describe_command(&command);
        let mut command = tokio::process::Command::from(command);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut attempt = 0;
        loop {
            debug!("Running command (attempt {}/{}): {}", attempt + 1, retries + 1, line);

            let child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    debug!("Failed to start command: {}", e);
                    return CommandOutcome::failure(format!("Failed to start '{}': {}", line, e));
                }
            };

            // Dropping the wait future on timeout drops the child, which kills it.
            let waited = match timeout {
                Some(limit) => tokio::time::timeout(limit, child.wait_with_output()).await,
                None => Ok(child.wait_with_output().await),
            };

            match waited {
                Ok(Ok(output)) => {
                    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    debug!("Command finished: status={}", output.status);

                    if output.status.success() {
                        return CommandOutcome::success(stdout);
                    }
                    return CommandOutcome::failure(format!("{}\n{}", stdout, stderr));
                }
                Ok(Err(e)) => {
                    debug!("Error waiting for command: {}", e);
                    return CommandOutcome::failure(e.to_string());
                }
                Err(_) => {
                    let secs = timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                    attempt += 1;
                    if attempt <= retries {
                        warn!("Timeout after {}s. Retrying {}/{}", secs, attempt, retries);
                        tokio::time::sleep(self.backoff).await;
                        continue;
                    }
                    warn!("Timeout after {}s. No more retries", secs);
                    return CommandOutcome::failure(format!("Timeout after {}s", secs));
                }
            }
        }
    }
}
