//! Concatenation orchestrator.
//!
//! One run goes: discover clips, consult the run record, then either stop
//! (everything already merged), append the new clips to the recorded output,
//! or build a fresh output from every clip. Media work happens in a scratch
//! directory that is removed however the run ends, and the record is only
//! rewritten after the output is in place.

use crate::classify::CategoryMarkers;
use crate::config::Config;
use crate::encode::{
    concat_segments, normalize_clip, ConcatError, EncodeSettings, NormalizeError,
    NormalizedSegment, Quality, Resolution, SegmentSource,
};
use crate::output::{next_available_output, publish_output, OutputError};
use crate::plan::{plan_paths, PlanEntry, ProcessingPlan};
use crate::probe::MediaProber;
use crate::runner::{CommandExecutor, RunLimits};
use crate::scan::discover_clips;
use crate::scratch::ScratchDir;
use crate::state::{absolute_path, decide, path_key, RunDecision, RunState, StateError, StateStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the concatenated file inside the scratch directory.
const RENDERED_NAME: &str = "concat_output.mp4";

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input directory does not exist: {0}")]
    InputDirMissing(PathBuf),

    #[error("No .{extension} files found in {dir}")]
    NoInputs { dir: PathBuf, extension: String },

    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Concat(#[from] ConcatError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every input was already merged; no media work was done.
    UpToDate { output: PathBuf, recorded_inputs: usize },
    /// An output was written.
    Concatenated {
        output: PathBuf,
        /// Segments in the final concat, including a reused prior output.
        segments: usize,
        /// Clips normalized during this run.
        new_clips: usize,
        /// Whether the clips were appended to an existing output.
        appended: bool,
    },
}

/// Everything a run needs besides the executor.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub encode: EncodeSettings,
    pub ffprobe: String,
    pub extension: String,
    pub markers: CategoryMarkers,
    pub block_size: usize,
    pub normalize_limits: RunLimits,
    pub concat_limits: RunLimits,
    pub state_file_name: String,
    pub output_prefix: String,
    /// Base for the scratch directory; the output directory when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl PipelineSettings {
    /// Builds settings from the configuration with an explicit resolution
    /// and quality, which the caller resolves from flags or config.
    pub fn from_config(config: &Config, resolution: Resolution, quality: Quality) -> Self {
        Self {
            encode: EncodeSettings::from_config(
                &config.tools.ffmpeg,
                &config.encoding,
                resolution,
                quality,
            ),
            ffprobe: config.tools.ffprobe.clone(),
            extension: config.ordering.extension.clone(),
            markers: CategoryMarkers::new(
                &config.ordering.category_a_marker,
                &config.ordering.category_b_marker,
            ),
            block_size: config.ordering.block_size,
            normalize_limits: RunLimits::new(
                Duration::from_secs(config.run.normalize_timeout_secs),
                config.run.retries,
            ),
            concat_limits: RunLimits::new(
                Duration::from_secs(config.run.concat_timeout_secs),
                config.run.retries,
            ),
            state_file_name: config.run.state_file_name.clone(),
            output_prefix: config.run.output_prefix.clone(),
            scratch_dir: config.run.scratch_dir.clone(),
        }
    }

    fn output_extension(&self) -> String {
        format!(".{}", self.extension.trim_start_matches('.'))
    }
}

/// Runs the pipeline against an executor.
pub struct Orchestrator<'a, E> {
    executor: &'a E,
    settings: PipelineSettings,
}

impl<'a, E: CommandExecutor> Orchestrator<'a, E> {
    pub fn new(executor: &'a E, settings: PipelineSettings) -> Self {
        Self { executor, settings }
    }

    /// Path of the run record for `output_dir`.
    pub fn state_path(&self, output_dir: &Path) -> PathBuf {
        absolute_path(output_dir).join(&self.settings.state_file_name)
    }

    /// Runs once over `input_dir`, writing into `output_dir`.
    ///
    /// # Errors
    /// Input errors (missing directory, no clips) are reported before any
    /// state is read. Any normalization, concatenation or publishing failure
    /// aborts the run with the record left as it was.
    pub async fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<RunOutcome, PipelineError> {
        let input_dir = absolute_path(input_dir);
        let output_dir = absolute_path(output_dir);

        if !input_dir.is_dir() {
            return Err(PipelineError::InputDirMissing(input_dir));
        }

        let store = StateStore::new(output_dir.join(&self.settings.state_file_name));
        let mut state = store.load()?;
        let recorded_output = state.recorded_output();

        // A recorded output living in the input directory is never an input.
        let clips: Vec<PathBuf> = discover_clips(&input_dir, &self.settings.extension)
            .into_iter()
            .filter(|clip| recorded_output.as_deref().map(path_key) != Some(path_key(clip)))
            .collect();
        if clips.is_empty() {
            return Err(PipelineError::NoInputs {
                dir: input_dir,
                extension: self.settings.extension.clone(),
            });
        }
        info!("Found {} clips in {}", clips.len(), input_dir.display());

        std::fs::create_dir_all(&output_dir).map_err(|source| PipelineError::Io {
            path: output_dir.clone(),
            source,
        })?;

        let keys: Vec<String> = clips.iter().map(|clip| path_key(clip)).collect();
        let output_exists = recorded_output.as_deref().is_some_and(Path::is_file);

        match decide(&state, &keys, output_exists) {
            RunDecision::UpToDate { unrecorded } => {
                let output = recorded_output.unwrap_or_default();
                info!(
                    "Skipping: all input files have already been used for {}",
                    output.file_name().unwrap_or_default().to_string_lossy()
                );
                if unrecorded.is_empty() {
                    debug!("No new videos to add, state unchanged at {}", store.path().display());
                } else {
                    state.input_videos.extend(unrecorded);
                    store.save(&state)?;
                    info!("Updated state with new videos at {}", store.path().display());
                }
                Ok(RunOutcome::UpToDate {
                    output,
                    recorded_inputs: state.input_videos.len(),
                })
            }
            RunDecision::Append { output } => {
                self.append(clips, &output_dir, &store, state, output).await
            }
            RunDecision::Fresh => self.fresh(clips, &output_dir, &store).await,
        }
    }

    /// Builds a new output from every clip.
    async fn fresh(
        &self,
        clips: Vec<PathBuf>,
        output_dir: &Path,
        store: &StateStore,
    ) -> Result<RunOutcome, PipelineError> {
        let plan = plan_paths(clips, &self.settings.markers, self.settings.block_size);
        let output = next_available_output(
            output_dir,
            &self.settings.output_prefix,
            &self.settings.output_extension(),
        );
        self.render_all(&plan, output_dir, store, output).await
    }

    /// Appends the clips missing from the record to the recorded output.
    ///
    /// New clips keep their relative order from the full plan, and the
    /// existing output leads the concatenation without being re-encoded.
    /// An existing output whose frame size differs from the target
    /// resolution cannot be spliced, so the whole plan is re-rendered into
    /// the same file instead.
    async fn append(
        &self,
        clips: Vec<PathBuf>,
        output_dir: &Path,
        store: &StateStore,
        mut state: RunState,
        output: PathBuf,
    ) -> Result<RunOutcome, PipelineError> {
        let known = state.known_inputs();
        let plan = plan_paths(clips, &self.settings.markers, self.settings.block_size);

        let prober = MediaProber::new(self.executor, &self.settings.ffprobe);
        let (width, height) = prober.dimensions(&output).await;
        let target = self.settings.encode.resolution;
        if (width, height) != (target.width, target.height) {
            warn!(
                "{} is {}x{} but the target is {}, re-rendering every clip",
                output.display(),
                width,
                height,
                target
            );
            return self.render_all(&plan, output_dir, store, output).await;
        }

        let entries: Vec<(usize, &PlanEntry)> = plan
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !known.contains(&path_key(&entry.clip.path)))
            .collect();
        info!(
            "Appending {} new clips to {}",
            entries.len(),
            output.display()
        );

        let segments = self.render(&entries, Some(&output), &output, output_dir).await?;

        let recorded: HashSet<String> = state.input_videos.iter().cloned().collect();
        let new_keys: Vec<String> = entries
            .iter()
            .map(|(_, entry)| path_key(&entry.clip.path))
            .filter(|key| !recorded.contains(key))
            .collect();
        state.input_videos.extend(new_keys);
        state.output_video = path_key(&output);
        store.save(&state)?;
        info!("Saved state to {}", store.path().display());

        Ok(RunOutcome::Concatenated {
            output,
            segments,
            new_clips: entries.len(),
            appended: true,
        })
    }

    /// Renders every planned clip into `output` and records exactly those
    /// clips against it.
    async fn render_all(
        &self,
        plan: &ProcessingPlan,
        output_dir: &Path,
        store: &StateStore,
        output: PathBuf,
    ) -> Result<RunOutcome, PipelineError> {
        let entries: Vec<(usize, &PlanEntry)> = plan.entries.iter().enumerate().collect();
        let segments = self.render(&entries, None, &output, output_dir).await?;

        let state = RunState {
            input_videos: plan.entries.iter().map(|e| path_key(&e.clip.path)).collect(),
            output_video: path_key(&output),
        };
        store.save(&state)?;
        info!("Saved state to {}", store.path().display());

        Ok(RunOutcome::Concatenated {
            output,
            segments,
            new_clips: plan.len(),
            appended: false,
        })
    }

    /// Normalizes `entries`, concatenates them after `prior` (if any) and
    /// publishes the result at `dest`. Returns the number of segments.
    async fn render(
        &self,
        entries: &[(usize, &PlanEntry)],
        prior: Option<&Path>,
        dest: &Path,
        output_dir: &Path,
    ) -> Result<usize, PipelineError> {
        let base = self
            .settings
            .scratch_dir
            .clone()
            .unwrap_or_else(|| output_dir.to_path_buf());
        let scratch = ScratchDir::create_in(&base).map_err(|source| PipelineError::Io {
            path: base.clone(),
            source,
        })?;

        let result = self.render_in(&scratch, entries, prior, dest).await;
        scratch.close();
        result
    }

    async fn render_in(
        &self,
        scratch: &ScratchDir,
        entries: &[(usize, &PlanEntry)],
        prior: Option<&Path>,
        dest: &Path,
    ) -> Result<usize, PipelineError> {
        let prober = MediaProber::new(self.executor, &self.settings.ffprobe);
        let mut segments = Vec::with_capacity(entries.len() + 1);

        if let Some(prior) = prior {
            segments.push(NormalizedSegment {
                path: prior.to_path_buf(),
                has_audio: prober.has_audio(prior).await,
                source: SegmentSource::PriorOutput,
            });
        }

        debug!(
            "Processing order: {:?}",
            entries
                .iter()
                .map(|(_, entry)| entry.clip.file_name())
                .collect::<Vec<_>>()
        );
        for (index, entry) in entries {
            let segment = normalize_clip(
                self.executor,
                &prober,
                &self.settings.encode,
                &entry.clip.path,
                *index,
                scratch.path(),
                self.settings.normalize_limits,
            )
            .await?;
            segments.push(segment);
        }

        let rendered = scratch.file(RENDERED_NAME);
        concat_segments(
            self.executor,
            &self.settings.encode,
            &segments,
            &rendered,
            self.settings.concat_limits,
        )
        .await?;
        publish_output(&rendered, dest)?;

        info!("Saved as {} ({} segments)", dest.display(), segments.len());
        Ok(segments.len())
    }
}
