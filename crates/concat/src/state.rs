//! Persisted run record.
//!
//! The record lists the inputs already merged into an output and the path of
//! that output. It is loaded once per run, decided on in memory, and written
//! back with a single whole-file rewrite.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from reading or writing the run record.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Inputs already incorporated into `output_video`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Forward-slash input paths in the order they were recorded.
    pub input_videos: Vec<String>,
    /// Forward-slash output path, empty when nothing was produced yet.
    pub output_video: String,
}

impl RunState {
    /// Parses a record, treating anything unreadable as empty.
    ///
    /// A document that is not JSON, or whose fields have the wrong type,
    /// yields empty values for the affected fields. Non-string entries in
    /// `input_videos` are dropped.
    pub fn from_json(text: &str) -> Self {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("State file is not valid JSON ({}), starting from empty state", e);
                return Self::default();
            }
        };

        let input_videos = match value.get("input_videos") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
            Some(_) => {
                warn!("State field input_videos is not a list, ignoring it");
                Vec::new()
            }
            None => Vec::new(),
        };

        let output_video = match value.get("output_video") {
            Some(Value::String(path)) => path.clone(),
            Some(Value::Null) | None => String::new(),
            Some(_) => {
                warn!("State field output_video is not a string, ignoring it");
                String::new()
            }
        };

        Self {
            input_videos,
            output_video,
        }
    }

    /// Serializes with 4-space indentation.
    pub fn to_json(&self) -> Result<String, StateError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// The recorded output, if any.
    pub fn recorded_output(&self) -> Option<PathBuf> {
        if self.output_video.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.output_video))
        }
    }

    /// Recorded inputs with backslashes converted, for membership checks.
    pub fn known_inputs(&self) -> HashSet<String> {
        self.input_videos.iter().map(|p| p.replace('\\', "/")).collect()
    }
}

/// Canonical record key for a path: [`absolute_path`] with forward slashes.
pub fn path_key(path: &Path) -> String {
    absolute_path(path).to_string_lossy().replace('\\', "/")
}

/// Makes `path` absolute against the working directory and resolves `.`
/// and `..` lexically. Symlinks are not followed.
pub fn absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// What a run has to do, decided before any transcoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    /// Every discovered input is already in the recorded output.
    /// `unrecorded` lists discovered keys whose exact form is missing from
    /// the record (legacy entries written with other separators).
    UpToDate { unrecorded: Vec<String> },
    /// The recorded output exists and new inputs must be appended to it.
    Append { output: PathBuf },
    /// No usable prior output; build a new one from every input.
    Fresh,
}

/// Decides the run from the record and the discovered input keys.
///
/// `output_exists` reports whether the recorded output is still on disk.
pub fn decide(state: &RunState, discovered: &[String], output_exists: bool) -> RunDecision {
    let output = match state.recorded_output() {
        Some(output) if output_exists => output,
        _ => return RunDecision::Fresh,
    };

    let known = state.known_inputs();
    if discovered.iter().all(|key| known.contains(key)) {
        let literal: HashSet<&str> = state.input_videos.iter().map(String::as_str).collect();
        let unrecorded = discovered
            .iter()
            .filter(|key| !literal.contains(key.as_str()))
            .cloned()
            .collect();
        RunDecision::UpToDate { unrecorded }
    } else {
        RunDecision::Append { output }
    }
}

/// Reads and writes the record file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record. A missing file is empty state.
    pub fn load(&self) -> Result<RunState, StateError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(RunState::from_json(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                Ok(RunState::default())
            }
            Err(source) => Err(StateError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Rewrites the whole record.
    ///
    /// The document is written to a temporary file next to the record and
    /// renamed over it, so a crash leaves either the old or the new record.
    pub fn save(&self, state: &RunState) -> Result<(), StateError> {
        let json = state.to_json()?;
        let write_error = |source| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_error)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(write_error)?;
        temp.write_all(json.as_bytes()).map_err(write_error)?;
        temp.flush().map_err(write_error)?;
        temp.persist(&self.path).map_err(|e| write_error(e.error))?;

        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}
