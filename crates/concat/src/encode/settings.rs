//! Uniform output format shared by normalization and concatenation.

use crate::config::EncodingConfig;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a resolution or quality value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Invalid resolution format '{0}'. Use WIDTHxHEIGHT (e.g., 1920x1080)")]
    ResolutionFormat(String),

    #[error("Invalid resolution '{0}': dimensions must be even")]
    OddResolution(String),

    #[error("Invalid resolution '{0}': dimensions must be positive")]
    ZeroResolution(String),

    #[error("Invalid quality level {0}: expected 1, 2 or 3")]
    Quality(u8),
}

/// Target frame size. Both dimensions are positive and even.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Result<Self, SettingsError> {
        let text = format!("{}x{}", width, height);
        if width == 0 || height == 0 {
            return Err(SettingsError::ZeroResolution(text));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(SettingsError::OddResolution(text));
        }
        Ok(Self { width, height })
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl FromStr for Resolution {
    type Err = SettingsError;

    /// Parses `WIDTHxHEIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = || SettingsError::ResolutionFormat(s.to_string());
        let (width, height) = s
            .trim()
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(format_error)?;
        let width = width.trim().parse::<u32>().map_err(|_| format_error())?;
        let height = height.trim().parse::<u32>().map_err(|_| format_error())?;
        Resolution::new(width, height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encoding speed/quality trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    Fastest,
    Balanced,
    #[default]
    Best,
}

impl Quality {
    /// Maps the user-facing level (1 = fastest, 3 = best).
    pub fn from_level(level: u8) -> Result<Self, SettingsError> {
        match level {
            1 => Ok(Quality::Fastest),
            2 => Ok(Quality::Balanced),
            3 => Ok(Quality::Best),
            other => Err(SettingsError::Quality(other)),
        }
    }

    /// x264 preset name for this level.
    pub fn preset(&self) -> &'static str {
        match self {
            Quality::Fastest => "ultrafast",
            Quality::Balanced => "medium",
            Quality::Best => "veryslow",
        }
    }
}

/// Everything the normalization and concatenation commands need.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub ffmpeg: String,
    pub resolution: Resolution,
    pub quality: Quality,
    pub video_codec: String,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub sample_rate: u32,
    pub audio_channels: u32,
    pub frame_rate: u32,
    pub pixel_format: String,
    pub keyframe_interval_secs: u32,
}

impl EncodeSettings {
    /// Builds settings from the `[encoding]` section with an explicit
    /// resolution and quality (typically from the command line).
    pub fn from_config(
        ffmpeg: &str,
        encoding: &EncodingConfig,
        resolution: Resolution,
        quality: Quality,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            resolution,
            quality,
            video_codec: encoding.video_codec.clone(),
            video_bitrate: encoding.video_bitrate.clone(),
            audio_codec: encoding.audio_codec.clone(),
            audio_bitrate: encoding.audio_bitrate.clone(),
            sample_rate: encoding.sample_rate,
            audio_channels: encoding.audio_channels,
            frame_rate: encoding.frame_rate,
            pixel_format: encoding.pixel_format.clone(),
            keyframe_interval_secs: encoding.keyframe_interval_secs,
        }
    }

    /// Scale to fit, pad to the exact box (centered), square pixels,
    /// constant frame rate.
    pub fn video_filter(&self) -> String {
        let Resolution { width, height } = self.resolution;
        [
            format!(
                "scale={}:{}:force_original_aspect_ratio=decrease:force_divisible_by=2",
                width, height
            ),
            format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", width, height),
            "setsar=1".to_string(),
            format!("fps={}", self.frame_rate),
        ]
        .join(",")
    }

    /// Expression forcing a keyframe every `keyframe_interval_secs`.
    pub fn keyframe_expr(&self) -> String {
        format!("expr:gte(t,n_forced*{})", self.keyframe_interval_secs)
    }

    /// Source for synthesized silence matching the audio layout.
    pub fn silence_source(&self) -> String {
        let layout = match self.audio_channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{}c", n),
        };
        format!(
            "anullsrc=channel_layout={}:sample_rate={}",
            layout, self.sample_rate
        )
    }

    /// Video encoder arguments shared by both stages.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.quality.preset().to_string(),
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-r".to_string(),
            self.frame_rate.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
        ]
    }

    /// Audio encoder arguments shared by both stages.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            self.audio_channels.to_string(),
        ]
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from_config(
            "ffmpeg",
            &EncodingConfig::default(),
            Resolution::default(),
            Quality::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolution_accepts_even() {
        let resolution: Resolution = "1920x1080".parse().unwrap();
        assert_eq!(resolution, Resolution { width: 1920, height: 1080 });
        assert_eq!(resolution.to_string(), "1920x1080");
    }

    #[test]
    fn test_resolution_rejects_odd_width() {
        assert_eq!(
            "1921x1080".parse::<Resolution>(),
            Err(SettingsError::OddResolution("1921x1080".to_string()))
        );
    }

    #[test]
    fn test_resolution_rejects_bad_format() {
        for bad in ["1920", "1920x", "x1080", "wide x tall", "1920*1080", "-2x4", ""] {
            assert!(
                matches!(bad.parse::<Resolution>(), Err(SettingsError::ResolutionFormat(_))),
                "{:?} should be a format error",
                bad
            );
        }
    }

    #[test]
    fn test_resolution_rejects_zero() {
        assert!(matches!(
            "0x1080".parse::<Resolution>(),
            Err(SettingsError::ZeroResolution(_))
        ));
    }

    #[test]
    fn test_quality_levels_map_to_presets() {
        assert_eq!(Quality::from_level(1).unwrap().preset(), "ultrafast");
        assert_eq!(Quality::from_level(2).unwrap().preset(), "medium");
        assert_eq!(Quality::from_level(3).unwrap().preset(), "veryslow");
        assert_eq!(Quality::from_level(0), Err(SettingsError::Quality(0)));
        assert_eq!(Quality::from_level(4), Err(SettingsError::Quality(4)));
    }

    #[test]
    fn test_video_filter_for_default_settings() {
        let settings = EncodeSettings::default();
        assert_eq!(
            settings.video_filter(),
            "scale=1920:1080:force_original_aspect_ratio=decrease:force_divisible_by=2,\
             pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=30"
        );
        assert_eq!(settings.keyframe_expr(), "expr:gte(t,n_forced*2)");
        assert_eq!(
            settings.silence_source(),
            "anullsrc=channel_layout=stereo:sample_rate=48000"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_resolution_parity(width in 1u32..8000, height in 1u32..8000) {
            let text = format!("{}x{}", width, height);
            let parsed = text.parse::<Resolution>();
            if width % 2 == 0 && height % 2 == 0 {
                prop_assert_eq!(parsed, Ok(Resolution { width, height }));
            } else {
                prop_assert_eq!(parsed, Err(SettingsError::OddResolution(text)));
            }
        }
    }
}
