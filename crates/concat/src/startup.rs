//! Startup checks
//!
//! Verifies that the transcoding tools can be started before any work is
//! planned, so a missing ffmpeg fails fast instead of on the first clip.

use crate::runner::CommandExecutor;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Time allowed for a `-version` query.
const VERSION_TIMEOUT: Duration = Duration::from_secs(15);

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{tool} not available: {detail}")]
    ToolUnavailable { tool: String, detail: String },
}

/// Parse a `<tool> version X.Y ...` banner and extract the major version
///
/// Handles release numbers (`7.1.1`) and git snapshots prefixed with `n`
/// (`n8.0-123-gabcdef`). Snapshot builds named only by date
/// (`N-112345-g...`) have no major version and yield `None`.
pub fn parse_tool_version(tool: &str, version_output: &str) -> Option<u32> {
    let needle = format!("{} version", tool.to_lowercase());
    let version_line = version_output
        .lines()
        .map(str::to_lowercase)
        .find(|line| line.contains(&needle))?;

    let token = version_line
        .split(&needle)
        .nth(1)?
        .split_whitespace()
        .next()?
        .trim_start_matches('n')
        .to_string();

    token.split(['.', '-']).next()?.parse().ok()
}

/// Runs `<program> -version` and returns the parsed major version.
///
/// # Errors
/// Fails when the program cannot be started or exits non-zero. An
/// unparseable banner is only a warning.
pub async fn check_tool_available<E: CommandExecutor>(
    executor: &E,
    tool: &str,
    program: &str,
) -> Result<Option<u32>, StartupError> {
    let mut cmd = Command::new(program);
    cmd.arg("-version");

    let outcome = executor.run(cmd, Some(VERSION_TIMEOUT), 0).await;
    if !outcome.success {
        return Err(StartupError::ToolUnavailable {
            tool: tool.to_string(),
            detail: format!(
                "{} -version failed; is it installed and in PATH? {}",
                program,
                outcome.output.trim()
            ),
        });
    }

    let version = parse_tool_version(tool, &outcome.output);
    match version {
        Some(major) => info!("Found {} {} ({})", tool, major, program),
        None => warn!(
            "Could not parse {} version from: {}",
            tool,
            outcome.output.lines().next().unwrap_or("(empty)")
        ),
    }
    Ok(version)
}

/// Run all startup checks in order: ffmpeg, then ffprobe
pub async fn run_startup_checks<E: CommandExecutor>(
    executor: &E,
    ffmpeg: &str,
    ffprobe: &str,
) -> Result<(), StartupError> {
    check_tool_available(executor, "ffmpeg", ffmpeg).await?;
    check_tool_available(executor, "ffprobe", ffprobe).await?;
    Ok(())
}
