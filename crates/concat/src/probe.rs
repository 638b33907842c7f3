//! Media prober built on ffprobe.
//!
//! Answers the two questions the pipeline asks about a file: does it carry
//! an audio stream, and what are the dimensions of its first video stream.

use crate::runner::CommandExecutor;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// Dimensions substituted when the video stream cannot be probed.
pub const FALLBACK_DIMENSIONS: (u32, u32) = (1920, 1080);

/// Error type for parsing ffprobe output.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe command failed to execute.
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    /// Failed to parse ffprobe JSON output.
    #[error("Failed to parse ffprobe output: {0}")]
    ParseError(String),

    /// ffprobe reported no usable video stream.
    #[error("No video stream with dimensions found")]
    NoVideoStream,
}

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub streams: Option<Vec<Stream>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub width: Option<u32>,
        pub height: Option<u32>,
    }
}

#[derive(Debug, Deserialize)]
struct StreamList {
    #[serde(default)]
    streams: Vec<serde_json::Value>,
}

/// Builds the ffprobe query listing the audio streams of `path`.
pub fn build_audio_probe_command(ffprobe: &str, path: &Path) -> Command {
    let mut cmd = Command::new(ffprobe);
    cmd.args(["-v", "error", "-select_streams", "a", "-show_entries"])
        .arg("stream=index,codec_type")
        .args(["-of", "json"])
        .arg(path);
    cmd
}

/// Builds the ffprobe query for the dimensions of the first video stream.
pub fn build_dimensions_probe_command(ffprobe: &str, path: &Path) -> Command {
    let mut cmd = Command::new(ffprobe);
    cmd.args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
        .arg("stream=width,height")
        .args(["-of", "json"])
        .arg(path);
    cmd
}

/// Parses an audio stream listing. Any listed stream counts as audio.
pub fn parse_audio_streams(json_str: &str) -> Result<bool, ProbeError> {
    let list: StreamList =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;
    Ok(!list.streams.is_empty())
}

/// Parses a dimensions query into `(width, height)`.
pub fn parse_dimensions(json_str: &str) -> Result<(u32, u32), ProbeError> {
    let ffprobe: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let stream = ffprobe
        .streams
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or(ProbeError::NoVideoStream)?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(ProbeError::NoVideoStream),
    }
}

/// Queries per-file stream properties through an executor.
pub struct MediaProber<'a, E> {
    executor: &'a E,
    ffprobe: &'a str,
}

impl<'a, E: CommandExecutor> MediaProber<'a, E> {
    pub fn new(executor: &'a E, ffprobe: &'a str) -> Self {
        Self { executor, ffprobe }
    }

    /// Whether `path` has at least one audio stream.
    ///
    /// A failed or unparseable probe assumes audio is present, so real audio
    /// is never replaced with silence; ffmpeg fails on the mapping instead if
    /// the stream really is missing.
    pub async fn has_audio(&self, path: &Path) -> bool {
        match self.try_has_audio(path).await {
            Ok(has_audio) => {
                debug!("Checking audio: {} -> {}", path.display(), has_audio);
                has_audio
            }
            Err(e) => {
                warn!(
                    "Could not check audio for {} ({}). Keeping source audio",
                    path.display(),
                    e
                );
                true
            }
        }
    }

    async fn try_has_audio(&self, path: &Path) -> Result<bool, ProbeError> {
        let outcome = self
            .executor
            .run(build_audio_probe_command(self.ffprobe, path), None, 0)
            .await;
        if !outcome.success {
            return Err(ProbeError::FfprobeFailed(outcome.output.trim().to_string()));
        }
        parse_audio_streams(&outcome.output)
    }

    /// Dimensions of the first video stream of `path`.
    ///
    /// Falls back to [`FALLBACK_DIMENSIONS`] with a warning on any failure.
    pub async fn dimensions(&self, path: &Path) -> (u32, u32) {
        match self.try_dimensions(path).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                let (width, height) = FALLBACK_DIMENSIONS;
                warn!(
                    "Could not get dimensions for {} ({}). Using {}x{}",
                    path.display(),
                    e,
                    width,
                    height
                );
                FALLBACK_DIMENSIONS
            }
        }
    }

    async fn try_dimensions(&self, path: &Path) -> Result<(u32, u32), ProbeError> {
        let outcome = self
            .executor
            .run(build_dimensions_probe_command(self.ffprobe, path), None, 0)
            .await;
        if !outcome.success {
            return Err(ProbeError::FfprobeFailed(outcome.output.trim().to_string()));
        }
        parse_dimensions(&outcome.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTools;
    use std::ffi::OsStr;
    use std::path::PathBuf;

    fn get_command_args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    #[test]
    fn test_audio_probe_command_selects_audio_as_json() {
        let cmd = build_audio_probe_command("ffprobe", Path::new("/clips/a.mp4"));
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("ffprobe"));
        assert!(args.windows(2).any(|p| p[0] == "-select_streams" && p[1] == "a"));
        assert!(args.windows(2).any(|p| p[0] == "-of" && p[1] == "json"));
        assert_eq!(args.last().unwrap(), "/clips/a.mp4");
    }

    #[test]
    fn test_dimensions_probe_command_selects_first_video_stream() {
        let cmd = build_dimensions_probe_command("/opt/ffprobe", Path::new("b.mp4"));
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("/opt/ffprobe"));
        assert!(args.windows(2).any(|p| p[0] == "-select_streams" && p[1] == "v:0"));
        assert!(args.contains(&"stream=width,height".to_string()));
    }

    #[test]
    fn test_parse_audio_streams() {
        assert!(parse_audio_streams(r#"{"streams": [{"index": 1}]}"#).unwrap());
        assert!(!parse_audio_streams(r#"{"streams": []}"#).unwrap());
        assert!(!parse_audio_streams("{}").unwrap());
        assert!(parse_audio_streams("Invalid data found").is_err());
    }

    #[test]
    fn test_parse_dimensions() {
        let json = r#"{
            "programs": [],
            "streams": [
                { "width": 640, "height": 360 }
            ]
        }"#;
        assert_eq!(parse_dimensions(json).unwrap(), (640, 360));
    }

    #[test]
    fn test_parse_dimensions_missing_stream() {
        assert!(matches!(
            parse_dimensions(r#"{"streams": []}"#),
            Err(ProbeError::NoVideoStream)
        ));
        assert!(matches!(
            parse_dimensions(r#"{"streams": [{"width": 640}]}"#),
            Err(ProbeError::NoVideoStream)
        ));
        assert!(matches!(parse_dimensions("oops"), Err(ProbeError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_has_audio_uses_probe_result() {
        let tools = FakeTools::new().with_silent("mute.mp4");
        let prober = MediaProber::new(&tools, "ffprobe");

        assert!(prober.has_audio(&PathBuf::from("/in/loud.mp4")).await);
        assert!(!prober.has_audio(&PathBuf::from("/in/mute.mp4")).await);
    }

    #[tokio::test]
    async fn test_failed_audio_check_keeps_source_audio() {
        let tools = FakeTools {
            audio_query_fails: true,
            ..FakeTools::new().with_silent("mute.mp4")
        };
        let prober = MediaProber::new(&tools, "ffprobe");

        assert!(prober.has_audio(&PathBuf::from("/in/mute.mp4")).await);
        assert_eq!(tools.calls_to("ffprobe").len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_audio_check_keeps_source_audio() {
        let tools = FakeTools {
            broken_probe: true,
            ..FakeTools::new()
        };
        let prober = MediaProber::new(&tools, "ffprobe");

        assert!(prober.has_audio(&PathBuf::from("/in/a.mp4")).await);
    }

    #[tokio::test]
    async fn test_dimensions_fall_back_on_unparseable_output() {
        let tools = FakeTools {
            broken_probe: true,
            ..FakeTools::new()
        };
        let prober = MediaProber::new(&tools, "ffprobe");

        assert_eq!(
            prober.dimensions(&PathBuf::from("/in/a.mp4")).await,
            FALLBACK_DIMENSIONS
        );
    }

    #[tokio::test]
    async fn test_dimensions_reported() {
        let tools = FakeTools {
            dimensions: Some((640, 360)),
            ..FakeTools::new()
        };
        let prober = MediaProber::new(&tools, "ffprobe");

        assert_eq!(prober.dimensions(&PathBuf::from("/in/a.mp4")).await, (640, 360));
    }
}
