//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Transcoding engine binary
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// Stream introspection binary
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Uniform output format shared by normalization and concatenation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodingConfig {
    /// Target resolution as `WIDTHxHEIGHT` (both even)
    #[serde(default = "default_resolution")]
    pub resolution: String,
    /// Quality level: 1 = fastest, 2 = balanced, 3 = best
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    /// Audio sample rate in Hz, also used for synthesized silence
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_audio_channels")]
    pub audio_channels: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    /// Forced keyframe spacing in seconds of timeline
    #[serde(default = "default_keyframe_interval_secs")]
    pub keyframe_interval_secs: u32,
}

fn default_resolution() -> String {
    "1920x1080".to_string()
}

fn default_quality() -> u8 {
    3
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_video_bitrate() -> String {
    "5000k".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_audio_channels() -> u32 {
    2
}

fn default_frame_rate() -> u32 {
    30
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_keyframe_interval_secs() -> u32 {
    2
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            quality: default_quality(),
            video_codec: default_video_codec(),
            video_bitrate: default_video_bitrate(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            sample_rate: default_sample_rate(),
            audio_channels: default_audio_channels(),
            frame_rate: default_frame_rate(),
            pixel_format: default_pixel_format(),
            keyframe_interval_secs: default_keyframe_interval_secs(),
        }
    }
}

/// Discovery and ordering rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderingConfig {
    /// Extension of the clips picked up from the input directory (without dot)
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Filename marker of the first interleaved category
    #[serde(default = "default_category_a_marker")]
    pub category_a_marker: String,
    /// Filename marker of the second interleaved category
    #[serde(default = "default_category_b_marker")]
    pub category_b_marker: String,
    /// Clips taken from one category before switching to the other
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

fn default_extension() -> String {
    "mp4".to_string()
}

fn default_category_a_marker() -> String {
    "pic".to_string()
}

fn default_category_b_marker() -> String {
    "uni".to_string()
}

fn default_block_size() -> usize {
    2
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            category_a_marker: default_category_a_marker(),
            category_b_marker: default_category_b_marker(),
            block_size: default_block_size(),
        }
    }
}

/// Per-run limits and file names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default = "default_normalize_timeout_secs")]
    pub normalize_timeout_secs: u64,
    #[serde(default = "default_concat_timeout_secs")]
    pub concat_timeout_secs: u64,
    /// Additional attempts after a timed out transcoding call
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// Name of the state record inside the output directory
    #[serde(default = "default_state_file_name")]
    pub state_file_name: String,
    /// Prefix of freshly numbered output files
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    /// Parent of the per-run scratch directory (output directory if None)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_normalize_timeout_secs() -> u64 {
    300
}

fn default_concat_timeout_secs() -> u64 {
    600
}

fn default_retries() -> u32 {
    1
}

fn default_retry_backoff_secs() -> u64 {
    2
}

fn default_state_file_name() -> String {
    "concat_metadata.json".to_string()
}

fn default_output_prefix() -> String {
    "Concat".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            normalize_timeout_secs: default_normalize_timeout_secs(),
            concat_timeout_secs: default_concat_timeout_secs(),
            retries: default_retries(),
            retry_backoff_secs: default_retry_backoff_secs(),
            state_file_name: default_state_file_name(),
            output_prefix: default_output_prefix(),
            scratch_dir: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub encoding: EncodingConfig,
    #[serde(default)]
    pub ordering: OrderingConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - CONCAT_FFMPEG -> tools.ffmpeg
    /// - CONCAT_FFPROBE -> tools.ffprobe
    /// - CONCAT_RETRIES -> run.retries
    /// - CONCAT_NORMALIZE_TIMEOUT_SECS -> run.normalize_timeout_secs
    /// - CONCAT_CONCAT_TIMEOUT_SECS -> run.concat_timeout_secs
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("CONCAT_FFMPEG") {
            if !val.trim().is_empty() {
                self.tools.ffmpeg = val;
            }
        }

        if let Ok(val) = env::var("CONCAT_FFPROBE") {
            if !val.trim().is_empty() {
                self.tools.ffprobe = val;
            }
        }

        if let Ok(val) = env::var("CONCAT_RETRIES") {
            if let Ok(retries) = val.parse::<u32>() {
                self.run.retries = retries;
            }
        }

        if let Ok(val) = env::var("CONCAT_NORMALIZE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.run.normalize_timeout_secs = secs;
            }
        }

        if let Ok(val) = env::var("CONCAT_CONCAT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.run.concat_timeout_secs = secs;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults.
    /// Environment overrides apply in both cases.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }
}
