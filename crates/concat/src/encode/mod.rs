//! Encoding stages: per-clip normalization and final concatenation

pub mod concat;
pub mod normalize;
pub mod settings;

pub use concat::{build_concat_command, build_filter_graph, concat_segments, ConcatError, FilterGraph};
pub use normalize::{
    build_normalize_command, normalize_clip, segment_path, NormalizeError, NormalizeParams,
    NormalizedSegment, SegmentSource,
};
pub use settings::{EncodeSettings, Quality, Resolution, SettingsError};
