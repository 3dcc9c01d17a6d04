use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use teopatch_core::{
    AppConfig, DrumPatch, Patch, SynthPatch,
    batch::run_batch,
    container::{form_size, read_metadata},
    detect::{parse_onsets, parse_silencedetect},
    diagnostics::init_tracing_with_options,
    persistence::{save_drum_patch, save_synth_patch},
    probe::{probe_audio_file, scan_patch_inputs},
    segments::{Segment, equal_segments, map_segments, patch_shortfall},
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "teopatch-cli")]
#[command(about = "Write synth and drum patches into AIFF patch files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `paths.logs_dir` from the config file.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a synth patch (default or from a JSON file) into an AIFF.
    Synth {
        #[command(flatten)]
        io: PatchIo,

        /// Patch JSON; defaults to the oscillator or sampler baseline.
        #[arg(long)]
        patch: Option<PathBuf>,

        #[arg(long, conflicts_with = "patch")]
        sampler: bool,

        #[arg(long, requires = "sampler")]
        base_freq: Option<f64>,
    },
    /// Write a randomly generated oscillator patch.
    RandomSynth {
        #[command(flatten)]
        io: PatchIo,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Map detector segments of a recording onto a drum kit.
    Drum {
        #[command(flatten)]
        io: PatchIo,

        #[command(flatten)]
        segments: SegmentSource,
    },
    /// Slice every AIFF in a directory into equal drum slots.
    DrumBatch {
        #[arg(long)]
        input_dir: PathBuf,

        /// Defaults to `paths.output_dir` from the config file.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long, default_value_t = 16)]
        splices: usize,
    },
    /// Print the patch JSON carried by an AIFF.
    Inspect { file: PathBuf },
}

#[derive(Debug, Args)]
struct PatchIo {
    /// AIFF whose audio the patch is written into.
    #[arg(long)]
    audio: PathBuf,

    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct SegmentSource {
    /// Onset detector output, one onset time per line.
    #[arg(long, requires = "duration", conflicts_with_all = ["silencedetect", "splices"])]
    onsets: Option<PathBuf>,

    /// ffmpeg silencedetect output.
    #[arg(long, conflicts_with = "splices")]
    silencedetect: Option<PathBuf>,

    /// Slice the recording into this many equal segments.
    #[arg(long, requires = "duration")]
    splices: Option<usize>,

    #[arg(long)]
    duration: Option<f64>,

    #[arg(long, default_value_t = 0.0)]
    correction: f64,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Synth { .. } => "synth",
            Self::RandomSynth { .. } => "random-synth",
            Self::Drum { .. } => "drum",
            Self::DrumBatch { .. } => "drum-batch",
            Self::Inspect { .. } => "inspect",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| config.paths.logs_dir.clone());
    let telemetry = init_tracing_with_options(
        &log_dir,
        &config.diagnostics.trace_file_prefix,
        &config.diagnostics.rust_log_filter,
    )?;

    let layout = config.container.layout();
    let session = telemetry.session_span(cli.command.name());
    let _session = session.enter();
    match cli.command {
        Commands::Synth {
            io,
            patch,
            sampler,
            base_freq,
        } => {
            let patch = match patch {
                Some(path) => {
                    let bytes = fs::read(&path)
                        .with_context(|| format!("failed to read patch: {}", path.display()))?;
                    SynthPatch::from_json_bytes(&bytes)?
                }
                None if sampler => SynthPatch::sampler(base_freq),
                None => SynthPatch::oscillator(),
            };
            save_synth_patch(&patch, &io.audio, &io.out, &layout)?;
            info!(out = %io.out.display(), name = %patch.encode(), "synth patch written");
        }
        Commands::RandomSynth { io, seed } => {
            let patch = SynthPatch::random(seed);
            save_synth_patch(&patch, &io.audio, &io.out, &layout)?;
            println!("{}", patch.encode());
        }
        Commands::Drum { io, segments } => {
            let segments = load_segments(&segments, &io.audio)?;
            match probe_audio_file(&io.audio) {
                Ok(probe) => warn_if_short(&io.audio, probe.duration_seconds, &config),
                Err(error) => warn!(%error, "could not probe input length"),
            }
            let (patch, assignment) = map_segments(&segments, &config.segmenting.mapper())?;
            if !assignment.skipped.is_empty() || assignment.overflow > 0 {
                warn!(
                    skipped = assignment.skipped.len(),
                    overflow = assignment.overflow,
                    "some segments were not mapped"
                );
            }
            save_drum_patch(&patch, &io.audio, &io.out, &layout)?;
            info!(
                out = %io.out.display(),
                slots = assignment.assigned.len(),
                "drum patch written"
            );
        }
        Commands::DrumBatch {
            input_dir,
            output_dir,
            splices,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.paths.output_dir.clone());
            fs::create_dir_all(&output_dir).with_context(|| {
                format!("failed to create output directory: {}", output_dir.display())
            })?;

            let inputs = scan_patch_inputs(&input_dir)?;
            let mapper = config.segmenting.mapper();
            let report = run_batch(inputs, config.batch.workers, |_, input| -> Result<PathBuf> {
                let audio = PathBuf::from(&input.path);
                let probe = probe_audio_file(&audio)?;
                warn_if_short(&audio, probe.duration_seconds, &config);
                let segments =
                    equal_segments(probe.duration_seconds, splices, Some(input.path.as_str()));
                let (patch, _) = map_segments(&segments, &mapper)?;
                let out = output_dir.join(kit_file_name(&audio));
                save_drum_patch(&patch, &audio, &out, &layout)?;
                Ok(out)
            });

            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(path) => println!("{}", path.display()),
                    Err(error) => eprintln!("item {} failed: {error:#}", outcome.index),
                }
            }
            if report.failed() > 0 {
                anyhow::bail!("{} of {} files failed", report.failed(), report.outcomes.len());
            }
        }
        Commands::Inspect { file } => {
            let bytes =
                fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let metadata = read_metadata(&bytes)?;
            let value: serde_json::Value =
                serde_json::from_slice(metadata).context("patch metadata is not valid json")?;
            println!("{}", serde_json::to_string_pretty(&value)?);

            match value.get("type").and_then(serde_json::Value::as_str) {
                Some("drum") => report_validation(DrumPatch::from_json_bytes(metadata)),
                Some(_) => report_validation(SynthPatch::from_json_bytes(metadata)),
                None => warn!("patch metadata has no type field"),
            }
            if let Some(size) = form_size(&bytes) {
                info!(form_size = size, file_len = bytes.len(), "container header");
            }
        }
    }

    Ok(())
}

fn load_segments(source: &SegmentSource, audio: &Path) -> Result<Vec<Segment>> {
    let label = audio.display().to_string();
    if let Some(path) = &source.onsets {
        let text = read_text(path)?;
        let duration = source.duration.unwrap_or_default();
        return Ok(parse_onsets(&text, duration, Some(label.as_str()))?);
    }
    if let Some(path) = &source.silencedetect {
        let text = read_text(path)?;
        return Ok(parse_silencedetect(&text, source.correction, Some(label.as_str()))?);
    }
    let Some(splices) = source.splices else {
        anyhow::bail!("one of --onsets, --silencedetect or --splices is required");
    };
    Ok(equal_segments(
        source.duration.unwrap_or_default(),
        splices,
        Some(label.as_str()),
    ))
}

fn warn_if_short(audio: &Path, duration_seconds: f64, config: &AppConfig) {
    if let Some(missing) = patch_shortfall(duration_seconds, config.segmenting.min_patch_seconds) {
        warn!(
            audio = %audio.display(),
            duration_seconds,
            missing_seconds = missing,
            "input is shorter than a full kit"
        );
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn kit_file_name(audio: &Path) -> String {
    let stem = audio
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("kit");
    format!("{stem}-kit.aif")
}

fn report_validation<P: Patch>(parsed: Result<P, teopatch_core::PatchError>) {
    match parsed.map(|patch| patch.validate().map(|()| patch)) {
        Ok(Ok(patch)) => info!(kind = P::LABEL, name = patch.name(), "patch is valid"),
        Ok(Err(error)) => warn!(kind = P::LABEL, %error, "patch fails validation"),
        Err(error) => warn!(kind = P::LABEL, %error, "patch does not decode"),
    }
}
