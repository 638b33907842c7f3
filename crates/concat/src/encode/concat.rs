//! Concatenation stage
//!
//! Splices every normalized segment into the final output with a single
//! `concat` filter graph. Segments contribute an audio leg only when their
//! own probe reported audio.

use crate::encode::normalize::NormalizedSegment;
use crate::encode::settings::EncodeSettings;
use crate::runner::{describe_command, CommandExecutor, RunLimits};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Error type for concatenation
#[derive(Debug, Error)]
pub enum ConcatError {
    /// Nothing to concatenate
    #[error("No segments to concatenate")]
    NoSegments,

    /// ffmpeg reported failure (non-zero exit or timeout)
    #[error("Concatenation failed: {0}")]
    EncodeFailed(String),

    /// ffmpeg claimed success but the output file is missing
    #[error("Concatenated output {0} was not created")]
    MissingOutput(PathBuf),
}

/// A `concat` filter graph and whether it declares an audio output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    pub expression: String,
    pub has_audio: bool,
}

/// Builds the filter graph for segments with the given audio presence.
///
/// Every segment contributes `[i:v]`; segment `i` also contributes `[i:a]`
/// when `audio[i]` is true. `n` is always the segment count, and one audio
/// output is declared when any segment has audio.
pub fn build_filter_graph(audio: &[bool]) -> FilterGraph {
    let has_audio = audio.iter().any(|&a| a);

    let mut expression = String::new();
    for (i, &segment_has_audio) in audio.iter().enumerate() {
        expression.push_str(&format!("[{}:v]", i));
        if segment_has_audio {
            expression.push_str(&format!("[{}:a]", i));
        }
    }
    expression.push_str(&format!(
        "concat=n={}:v=1:a={}[outv]",
        audio.len(),
        u8::from(has_audio)
    ));
    if has_audio {
        expression.push_str("[outa]");
    }

    FilterGraph {
        expression,
        has_audio,
    }
}

/// Build the ffmpeg command concatenating `segments` into `output`
///
/// Inputs are added in segment order so input index `i` matches label `i`
/// in the filter graph. The output is re-encoded with the same video
/// settings as normalization; audio is encoded only when the graph declares
/// an audio output, otherwise it is disabled with `-an`.
pub fn build_concat_command(
    settings: &EncodeSettings,
    segments: &[NormalizedSegment],
    output: &Path,
) -> Command {
    let audio: Vec<bool> = segments.iter().map(|s| s.has_audio).collect();
    let graph = build_filter_graph(&audio);

    let mut cmd = Command::new(&settings.ffmpeg);
    cmd.arg("-y");
    for segment in segments {
        cmd.arg("-i").arg(&segment.path);
    }

    cmd.arg("-filter_complex").arg(&graph.expression);
    cmd.args(["-map", "[outv]"]);
    if graph.has_audio {
        cmd.args(["-map", "[outa]"]);
    }

    cmd.args(settings.video_args());
    if graph.has_audio {
        cmd.args(settings.audio_args());
    } else {
        cmd.arg("-an");
    }

    cmd.arg(output);
    cmd
}

/// Concatenate `segments` into `output`
///
/// # Errors
/// Fails when there are no segments, when ffmpeg fails (after retries on
/// timeout) or when the output file is missing afterwards.
pub async fn concat_segments<E: CommandExecutor>(
    executor: &E,
    settings: &EncodeSettings,
    segments: &[NormalizedSegment],
    output: &Path,
    limits: RunLimits,
) -> Result<(), ConcatError> {
    if segments.is_empty() {
        return Err(ConcatError::NoSegments);
    }

    let cmd = build_concat_command(settings, segments, output);
    debug!("FFmpeg concat command: {}", describe_command(&cmd));

    let outcome = executor
        .run(cmd, Some(limits.timeout), limits.retries)
        .await;
    if !outcome.success {
        return Err(ConcatError::EncodeFailed(outcome.output.trim().to_string()));
    }
    if !output.is_file() {
        return Err(ConcatError::MissingOutput(output.to_path_buf()));
    }

    info!(
        "Concatenated {} segments into {}",
        segments.len(),
        output.display()
    );
    Ok(())
}
