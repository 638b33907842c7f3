//! Fake ffmpeg/ffprobe toolchain used by the unit tests.

use crate::runner::{CommandExecutor, CommandOutcome};
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

/// Records every command and answers like a tiny ffmpeg/ffprobe would.
///
/// - ffprobe audio queries report an audio stream unless the file name is
///   listed in `silent`, and exit non-zero when `audio_query_fails` is set.
/// - ffprobe dimension queries report `dimensions`.
/// - Every ffprobe query answers garbage when `broken_probe` is set.
/// - ffmpeg writes its last argument as the output file, unless one of its
///   inputs is listed in `failing`.
#[derive(Debug, Default)]
pub struct FakeTools {
    pub calls: Mutex<Vec<Vec<String>>>,
    pub silent: HashSet<String>,
    pub failing: HashSet<String>,
    pub skip_output: bool,
    pub broken_probe: bool,
    pub audio_query_fails: bool,
    pub dimensions: Option<(u32, u32)>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_silent(mut self, name: &str) -> Self {
        self.silent.insert(name.to_string());
        self
    }

    pub fn with_failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// All recorded invocations of `program` (matched on the file name).
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| file_name(&call[0]) == program)
            .cloned()
            .collect()
    }

    /// ffmpeg invocations that actually transcode (excluding `-version`).
    pub fn transcodes(&self) -> Vec<Vec<String>> {
        self.calls_to("ffmpeg")
            .into_iter()
            .filter(|call| call.iter().any(|a| a == "-i"))
            .collect()
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl CommandExecutor for FakeTools {
    async fn run(
        &self,
        command: Command,
        _timeout: Option<Duration>,
        _retries: u32,
    ) -> CommandOutcome {
        let mut call = vec![command.get_program().to_string_lossy().into_owned()];
        call.extend(command.get_args().map(|a| a.to_string_lossy().into_owned()));
        self.calls.lock().unwrap().push(call.clone());

        let program = file_name(&call[0]);
        let args = &call[1..];

        if args.first().map(String::as_str) == Some("-version") {
            return CommandOutcome::success(format!("{} version 7.1.1 Copyright (c) 2000-2025", program));
        }

        let target = args.last().cloned().unwrap_or_default();

        if program == "ffprobe" {
            if self.broken_probe {
                return CommandOutcome::success("not json");
            }
            let audio_query = args
                .windows(2)
                .any(|pair| pair[0] == "-select_streams" && pair[1] == "a");
            if audio_query {
                if self.audio_query_fails {
                    return CommandOutcome::failure("simulated ffprobe failure");
                }
                if self.silent.contains(&file_name(&target)) {
                    return CommandOutcome::success(r#"{"streams": []}"#);
                }
                return CommandOutcome::success(
                    r#"{"streams": [{"index": 1, "codec_type": "audio"}]}"#,
                );
            }
            let (width, height) = self.dimensions.unwrap_or((1920, 1080));
            return CommandOutcome::success(format!(
                r#"{{"streams": [{{"width": {}, "height": {}}}]}}"#,
                width, height
            ));
        }

        let inputs: Vec<String> = args
            .windows(2)
            .filter(|pair| pair[0] == "-i")
            .map(|pair| file_name(&pair[1]))
            .collect();
        if inputs.iter().any(|input| self.failing.contains(input)) {
            return CommandOutcome::failure("simulated encoder failure");
        }
        if !self.skip_output {
            let body = format!("rendered from {}", inputs.join(","));
            if std::fs::write(&target, body).is_err() {
                return CommandOutcome::failure(format!("cannot write {}", target));
            }
        }
        CommandOutcome::success("")
    }
}
