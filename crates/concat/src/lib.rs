//! Clip Concat
//!
//! Orders a directory of short clips, normalizes each one with ffmpeg and
//! splices them into a single output, remembering what was merged so later
//! runs only append new clips.

pub mod classify;
pub mod encode;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod runner;
pub mod scan;
pub mod scratch;
pub mod startup;
pub mod state;

#[cfg(test)]
mod testing;

pub use clip_concat_config as config;
pub use clip_concat_config::Config;
pub use classify::{classify_clip, Category, CategoryMarkers, InputClip};
pub use encode::{
    build_concat_command, build_filter_graph, build_normalize_command, ConcatError,
    EncodeSettings, NormalizeError, NormalizedSegment, Quality, Resolution, SettingsError,
};
pub use output::{next_available_output, publish_output, OutputError};
pub use pipeline::{Orchestrator, PipelineError, PipelineSettings, RunOutcome};
pub use plan::{build_plan, plan_paths, PlanEntry, PlanSlot, ProcessingPlan};
pub use probe::{MediaProber, ProbeError};
pub use runner::{CommandExecutor, CommandOutcome, ProcessRunner, RunLimits};
pub use scan::discover_clips;
pub use startup::{parse_tool_version, run_startup_checks, StartupError};
pub use state::{decide, path_key, RunDecision, RunState, StateError, StateStore};
