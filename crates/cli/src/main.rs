//! CLI entry point for clip-concat
//!
//! Parses command line arguments, sets up logging and runs the pipeline once.

use clap::Parser;
use clip_concat::{
    run_startup_checks, Config, Orchestrator, PipelineSettings, ProcessRunner, Quality,
    Resolution, RunOutcome,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Concatenate a directory of clips: a lead clip, then category blocks of two,
/// then everything else
#[derive(Parser, Debug)]
#[command(name = "clip-concat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input directory containing the clips
    input_dir: PathBuf,

    /// Output directory for the concatenated video and its state file
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Target resolution as WIDTHxHEIGHT, both even (e.g., 1920x1080)
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Quality level (1=fastest, 3=slowest/best quality)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    quality: Option<u8>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the ffmpeg/ffprobe availability checks
    #[arg(long)]
    skip_checks: bool,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Flag values win over the `[encoding]` section.
fn resolve_encoding(args: &Args, config: &Config) -> Result<(Resolution, Quality), String> {
    let resolution = match args.resolution {
        Some(resolution) => resolution,
        None => config
            .encoding
            .resolution
            .parse()
            .map_err(|e| format!("Invalid configured resolution: {}", e))?,
    };
    let level = args.quality.unwrap_or(config.encoding.quality);
    let quality = Quality::from_level(level).map_err(|e| e.to_string())?;
    Ok((resolution, quality))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    let config = match Config::load_or_default(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let (resolution, quality) = match resolve_encoding(&args, &config) {
        Ok(encoding) => encoding,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Target {} at preset {}", resolution, quality.preset());

    let runner = ProcessRunner::new(Duration::from_secs(config.run.retry_backoff_secs));

    if args.skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks(&runner, &config.tools.ffmpeg, &config.tools.ffprobe).await {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let settings = PipelineSettings::from_config(&config, resolution, quality);
    let orchestrator = Orchestrator::new(&runner, settings);

    match orchestrator.run(&args.input_dir, &args.output_dir).await {
        Ok(RunOutcome::UpToDate {
            output,
            recorded_inputs,
        }) => {
            info!(
                "Nothing to do: {} already contains all {} inputs",
                output.display(),
                recorded_inputs
            );
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Concatenated {
            output,
            segments,
            new_clips,
            appended,
        }) => {
            let verb = if appended { "Appended" } else { "Concatenated" };
            info!(
                "{} {} clips into {} ({} segments)",
                verb,
                new_clips,
                output.display(),
                segments
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
