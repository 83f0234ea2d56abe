use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use speech_deid::report;
use speech_deid::{DeidConfig, DeidPipelineBuilder, JsonTranscriptSource, VerificationStatus};
use tracing_subscriber::EnvFilter;

const AUDIO_EXTENSIONS: [&str; 2] = ["wav", "flac"];

#[derive(Debug, Parser)]
#[command(name = "deid_batch")]
#[command(about = "Remove spoken PII from conversation recordings and their transcripts")]
struct Args {
    /// Directory scanned recursively for .wav and .flac recordings.
    #[arg(long, env = "DEID_INPUT_DIR")]
    input: PathBuf,
    /// Directory holding `<conversation_id>.json` transcripts of the input audio.
    #[arg(long, env = "DEID_TRANSCRIPTS_DIR")]
    transcripts: PathBuf,
    /// Transcripts of the redacted audio; enables audio verification.
    #[arg(long, env = "DEID_VERIFY_TRANSCRIPTS_DIR")]
    verify_transcripts: Option<PathBuf>,
    #[arg(long, env = "DEID_OUTPUT_DIR")]
    output: Option<PathBuf>,
    /// JSON file overriding any subset of the default settings.
    #[arg(long, env = "DEID_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "DEID_WORKERS")]
    workers: Option<usize>,
    #[arg(long, env = "DEID_LIMIT")]
    limit: Option<usize>,
    /// Process and verify without writing any artifacts.
    #[arg(long, env = "DEID_NO_SAVE", default_value_t = false)]
    no_save: bool,
    #[arg(long, env = "DEID_TRANSCRIPTION_TIMEOUT_SECS")]
    transcription_timeout_secs: Option<f64>,
    /// Extra copy of the processing report, written even with --no-save.
    #[arg(long, env = "DEID_REPORT_OUT")]
    report_out: Option<PathBuf>,
}

fn main() {
    if run().is_err() {
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    let args = Args::parse();
    let result = run_batch(&args);
    if let Err(err) = &result {
        tracing::error!(error = %err, "deid_batch failed");
    }
    result
}

fn run_batch(args: &Args) -> Result<(), String> {
    require_path_exists(&args.input, "Input directory not found.")?;
    require_path_exists(&args.transcripts, "Transcript directory not found.")?;

    let mut config = match &args.config {
        Some(path) => DeidConfig::load(path).map_err(|err| err.to_string())?,
        None => DeidConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.no_save {
        config.save_outputs = false;
    }
    if args.transcription_timeout_secs.is_some() {
        config.transcription_timeout_secs = args.transcription_timeout_secs;
    }
    config.verify_audio = args.verify_transcripts.is_some();

    let mut audio_paths = Vec::new();
    collect_audio_files(&args.input, &mut audio_paths)?;
    audio_paths.sort();
    if let Some(limit) = args.limit {
        audio_paths.truncate(limit);
    }
    if audio_paths.is_empty() {
        return Err(format!(
            "No .wav or .flac recordings found under {}",
            args.input.display()
        ));
    }

    let mut builder = DeidPipelineBuilder::new(config).with_transcript_dir(&args.transcripts);
    if let Some(dir) = &args.verify_transcripts {
        builder = builder.with_verification_transcriber(Box::new(JsonTranscriptSource::new(dir)));
    }
    let pipeline = builder.build().map_err(|err| err.to_string())?;

    let progress = ProgressBar::new(audio_paths.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let outcome = pipeline
        .process_batch_with_progress(&audio_paths, |output| {
            progress.set_message(output.conversation_id.clone());
            progress.inc(1);
        })
        .map_err(|err| err.to_string())?;
    progress.finish_with_message("de-identification pass complete");

    if let Some(path) = &args.report_out {
        report::write_json(path, &outcome.report).map_err(|err| err.to_string())?;
        tracing::info!(report = %path.display(), "report copy written");
    }

    let summary = &outcome.report.summary;
    println!(
        "conversations: {} ok: {} failed: {} pii_redacted: {} duration: {:.1}min",
        summary.total_conversations,
        summary.successful,
        summary.failed,
        summary.total_pii_redacted,
        summary.total_duration_min
    );
    for status in VerificationStatus::ALL {
        let count = outcome
            .report
            .verification_status
            .get(status.as_str())
            .copied()
            .unwrap_or(0);
        println!("  {status}: {count}");
    }
    for failure in &outcome.report.failures {
        let stage = failure.stage.map_or("unknown", |s| s.as_str());
        println!(
            "  failed {} at {stage}: {}",
            failure.conversation_id, failure.error
        );
    }
    Ok(())
}

fn collect_audio_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), String> {
    let entries = fs::read_dir(dir)
        .map_err(|err| format!("Failed to read directory '{}': {err}", dir.display()))?;
    for entry in entries {
        let path = entry
            .map_err(|err| format!("Failed to read entry in '{}': {err}", dir.display()))?
            .path();
        if path.is_dir() {
            collect_audio_files(&path, out)?;
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_audio {
            out.push(path);
        }
    }
    Ok(())
}

fn require_path_exists(path: &Path, message: &str) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    Err(format!("{message} Missing path: {}", path.display()))
}
