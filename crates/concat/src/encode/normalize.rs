//! Normalization stage
//!
//! Re-encodes each planned clip into a segment with the uniform resolution,
//! frame rate, pixel format and audio layout, so the concatenation stage can
//! splice them safely.

use crate::encode::settings::EncodeSettings;
use crate::probe::MediaProber;
use crate::runner::{describe_command, CommandExecutor, RunLimits};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for normalization
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// ffmpeg reported failure (non-zero exit or timeout)
    #[error("Failed to process {input} into video: {output}")]
    EncodeFailed { input: PathBuf, output: String },

    /// ffmpeg claimed success but the segment file is missing
    #[error("Normalized segment {segment} for {input} was not created")]
    MissingSegment { input: PathBuf, segment: PathBuf },
}

/// Where a segment's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSource {
    /// Normalized from the plan entry at this index.
    Clip(usize),
    /// The previously recorded output, reused as-is.
    PriorOutput,
}

/// A normalized intermediate ready for concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSegment {
    pub path: PathBuf,
    /// Audio presence of the segment itself (not of its source).
    pub has_audio: bool,
    pub source: SegmentSource,
}

/// Parameters for a single normalization call
#[derive(Debug, Clone)]
pub struct NormalizeParams {
    /// Clip to normalize
    pub input_path: PathBuf,
    /// Segment file to produce
    pub output_path: PathBuf,
    /// Whether the source carries an audio stream; without one, silence is
    /// synthesized
    pub source_has_audio: bool,
}

/// Build the ffmpeg command normalizing one clip
///
/// Creates a Command configured with:
/// - The clip as input 0, plus a silent `anullsrc` input 1 when the clip has
///   no audio
/// - Explicit stream mapping (video from input 0, audio from 0 or 1)
/// - Uniform video encoding (codec, preset, bitrate, frame rate, pixel format)
/// - Periodic forced keyframes for clean splicing
/// - Uniform audio encoding, trimmed to the shortest stream when synthesized
/// - Scale/pad filter chain to the target box
pub fn build_normalize_command(settings: &EncodeSettings, params: &NormalizeParams) -> Command {
    let mut cmd = Command::new(&settings.ffmpeg);

    cmd.arg("-y");
    cmd.arg("-i").arg(&params.input_path);
    if !params.source_has_audio {
        cmd.args(["-f", "lavfi", "-i"]).arg(settings.silence_source());
    }

    cmd.args(["-map", "0:v:0", "-map"]);
    cmd.arg(if params.source_has_audio { "0:a:0" } else { "1:a:0" });

    cmd.args(settings.video_args());
    cmd.arg("-force_key_frames").arg(settings.keyframe_expr());
    cmd.args(settings.audio_args());
    if !params.source_has_audio {
        cmd.arg("-shortest");
    }

    cmd.arg("-vf").arg(settings.video_filter());
    cmd.arg(&params.output_path);

    cmd
}

/// Path of the segment for plan entry `index` inside the scratch directory.
pub fn segment_path(scratch: &Path, index: usize) -> PathBuf {
    scratch.join(format!("segment_{:04}.mp4", index + 1))
}

/// Normalize one clip into a segment
///
/// Probes the source for audio, runs ffmpeg with the configured timeout and
/// retries, checks that the segment exists, then probes the segment itself
/// for audio and dimensions.
///
/// # Errors
/// Any failure here is fatal for the run: a clip is never silently skipped.
pub async fn normalize_clip<E: CommandExecutor>(
    executor: &E,
    prober: &MediaProber<'_, E>,
    settings: &EncodeSettings,
    input_path: &Path,
    index: usize,
    scratch: &Path,
    limits: RunLimits,
) -> Result<NormalizedSegment, NormalizeError> {
    let params = NormalizeParams {
        input_path: input_path.to_path_buf(),
        output_path: segment_path(scratch, index),
        source_has_audio: prober.has_audio(input_path).await,
    };
    if !params.source_has_audio {
        debug!("{} has no audio, synthesizing silence", input_path.display());
    }

    let cmd = build_normalize_command(settings, &params);
    debug!("FFmpeg command for {}: {}", input_path.display(), describe_command(&cmd));

    let outcome = executor
        .run(cmd, Some(limits.timeout), limits.retries)
        .await;
    if !outcome.success {
        return Err(NormalizeError::EncodeFailed {
            input: params.input_path,
            output: outcome.output.trim().to_string(),
        });
    }
    if !params.output_path.is_file() {
        return Err(NormalizeError::MissingSegment {
            input: params.input_path,
            segment: params.output_path,
        });
    }

    let has_audio = prober.has_audio(&params.output_path).await;
    let (width, height) = prober.dimensions(&params.output_path).await;
    if (width, height) != (settings.resolution.width, settings.resolution.height) {
        warn!(
            "Segment {} is {}x{}, expected {}",
            params.output_path.display(),
            width,
            height,
            settings.resolution
        );
    }

    info!(
        "Processed {} as {}",
        input_path.file_name().unwrap_or_default().to_string_lossy(),
        params.output_path.display()
    );

    Ok(NormalizedSegment {
        path: params.output_path,
        has_audio,
        source: SegmentSource::Clip(index),
    })
}
