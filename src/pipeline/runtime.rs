use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempPath;

use crate::audio::{self, AudioBuffer};
use crate::config::DeidConfig;
use crate::error::{DeidError, Stage};
use crate::pipeline::traits::{PiiDetector, Transcriber};
use crate::redaction::{self, BleepRegion, RedactedTranscript, TextRedactor};
use crate::report;
use crate::types::{PiiMatch, TranscriptionResult};
use crate::verification::{VerificationResult, Verifier};

/// Everything produced for one recording. On failure `stage` names the stage
/// that failed and `error` carries its message.
#[derive(Debug, Clone)]
pub struct ConversationOutput {
    pub conversation_id: String,
    pub success: bool,
    pub stage: Option<Stage>,
    pub error: Option<String>,
    pub transcript_raw: Option<TranscriptionResult>,
    pub transcript_redacted: Option<RedactedTranscript>,
    pub pii_matches: Vec<PiiMatch>,
    pub bleep_regions: Vec<BleepRegion>,
    pub redacted_audio_path: Option<PathBuf>,
    pub verification: Option<VerificationResult>,
    pub sample_rate_hz: Option<u32>,
    pub audio_duration_secs: Option<f64>,
    pub processing_time_secs: f64,
}

impl ConversationOutput {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            success: false,
            stage: None,
            error: None,
            transcript_raw: None,
            transcript_redacted: None,
            pii_matches: Vec::new(),
            bleep_regions: Vec::new(),
            redacted_audio_path: None,
            verification: None,
            sample_rate_hz: None,
            audio_duration_secs: None,
            processing_time_secs: 0.0,
        }
    }

    /// Recording length, preferring the transcriber's figure.
    pub fn duration_secs(&self) -> f64 {
        self.transcript_raw
            .as_ref()
            .map(|t| t.audio_duration)
            .filter(|d| *d > 0.0)
            .or(self.audio_duration_secs)
            .unwrap_or(0.0)
    }

    fn fail(&mut self, err: &DeidError) {
        self.success = false;
        self.error = Some(err.to_string());
    }
}

pub struct DeidPipeline {
    config: DeidConfig,
    transcriber: Arc<dyn Transcriber>,
    verification_transcriber: Arc<dyn Transcriber>,
    detector: Box<dyn PiiDetector>,
    text_redactor: TextRedactor,
    verifier: Verifier,
}

pub(crate) struct DeidPipelineParts {
    pub config: DeidConfig,
    pub transcriber: Arc<dyn Transcriber>,
    pub verification_transcriber: Arc<dyn Transcriber>,
    pub detector: Box<dyn PiiDetector>,
}

impl DeidPipeline {
    pub(crate) fn from_parts(parts: DeidPipelineParts) -> Self {
        let verifier = Verifier::new(parts.config.verifier.clone());
        Self {
            config: parts.config,
            transcriber: parts.transcriber,
            verification_transcriber: parts.verification_transcriber,
            detector: parts.detector,
            text_redactor: TextRedactor,
            verifier,
        }
    }

    pub fn config(&self) -> &DeidConfig {
        &self.config
    }

    pub fn detector(&self) -> &dyn PiiDetector {
        self.detector.as_ref()
    }

    /// Runs every stage for one recording. Never returns an error: failures are
    /// recorded on the output with the stage they happened in.
    pub fn process_conversation(&self, audio_path: &Path) -> ConversationOutput {
        let started = Instant::now();
        let conversation_id = conversation_id_for(audio_path);
        let mut output = ConversationOutput::new(conversation_id.clone());

        tracing::info!(conversation_id = %conversation_id, "processing conversation");
        match self.run_stages(audio_path, &mut output) {
            Ok(()) => {
                output.success = true;
                output.stage = None;
                tracing::info!(
                    conversation_id = %conversation_id,
                    pii = output.pii_matches.len(),
                    status = ?output.verification.as_ref().map(|v| v.overall_status),
                    "conversation complete"
                );
            }
            Err(err) => {
                tracing::error!(
                    conversation_id = %conversation_id,
                    stage = ?output.stage,
                    error = %err,
                    "conversation failed"
                );
                output.fail(&err);
            }
        }
        output.processing_time_secs = started.elapsed().as_secs_f64();
        output
    }

    fn run_stages(
        &self,
        audio_path: &Path,
        output: &mut ConversationOutput,
    ) -> Result<(), DeidError> {
        output.stage = Some(Stage::Transcription);
        if !audio_path.exists() {
            return Err(DeidError::input_not_found(audio_path));
        }
        let mut transcript = self.transcribe(&self.transcriber, audio_path)?;
        if transcript.conversation_id.is_empty() {
            transcript.conversation_id = output.conversation_id.clone();
        }
        output.transcript_raw = Some(transcript.clone());

        output.stage = Some(Stage::Detection);
        let matches = self.detector.detect(&transcript.all_words());
        tracing::info!(
            conversation_id = %output.conversation_id,
            pii = matches.len(),
            "pii detected"
        );
        output.pii_matches = matches.clone();

        output.stage = Some(Stage::TextRedaction);
        let redacted = self.text_redactor.redact(&transcript, &matches);
        output.transcript_redacted = Some(redacted.clone());

        output.stage = Some(Stage::AudioRedaction);
        let mut audio = audio::read_mono(audio_path)?;
        output.sample_rate_hz = Some(audio.sample_rate_hz);
        output.audio_duration_secs = Some(audio.duration_secs());
        let regions =
            redaction::calculate_regions(&matches, audio.duration_secs(), &self.config.bleep);
        redaction::apply_regions(
            &mut audio.samples,
            audio.sample_rate_hz,
            &regions,
            &self.config.bleep,
        );
        output.bleep_regions = regions;
        let redacted_audio = self.write_redacted_audio(&output.conversation_id, &audio)?;
        if let Some(RedactedAudio::Saved(path)) = &redacted_audio {
            output.redacted_audio_path = Some(path.clone());
        }

        output.stage = Some(Stage::Verification);
        let retranscription = match (&redacted_audio, self.config.verify_audio) {
            (Some(file), true) => Some(self.transcribe(&self.verification_transcriber, file.path())),
            _ => None,
        };
        drop(redacted_audio);
        let verification = self
            .verifier
            .verify(&redacted, self.detector.as_ref(), retranscription);
        output.verification = Some(verification);

        if !self.config.save_outputs {
            return Ok(());
        }

        output.stage = Some(Stage::Persistence);
        let out = &self.config.output_dir;
        let id = &output.conversation_id;
        report::write_json(&out.join("transcripts_raw").join(format!("{id}.json")), &transcript)?;
        report::write_json(&out.join("transcripts_deid").join(format!("{id}.json")), &redacted)?;
        Ok(())
    }

    /// Saved under `audio/` when outputs are kept. Otherwise a uniquely named
    /// scratch copy is written only if audio verification needs a file to
    /// re-transcribe.
    fn write_redacted_audio(
        &self,
        conversation_id: &str,
        audio: &AudioBuffer,
    ) -> Result<Option<RedactedAudio>, DeidError> {
        let file = if self.config.save_outputs {
            RedactedAudio::Saved(
                self.config
                    .output_dir
                    .join("audio")
                    .join(format!("{conversation_id}.wav")),
            )
        } else if self.config.verify_audio {
            let scratch = tempfile::Builder::new()
                .prefix(&format!("speech_deid_{conversation_id}_"))
                .suffix(".wav")
                .tempfile()
                .map_err(|e| DeidError::io("create scratch audio file", e))?
                .into_temp_path();
            RedactedAudio::Scratch(scratch)
        } else {
            return Ok(None);
        };
        audio::write_wav(file.path(), audio)?;
        Ok(Some(file))
    }

    /// Calls the engine, bounded by the configured timeout. A call that times
    /// out keeps running on its detached thread; its result is discarded.
    fn transcribe(
        &self,
        transcriber: &Arc<dyn Transcriber>,
        audio_path: &Path,
    ) -> Result<TranscriptionResult, DeidError> {
        let Some(timeout) = self.config.transcription_timeout() else {
            return transcriber.transcribe(audio_path);
        };

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(transcriber);
        let path = audio_path.to_path_buf();
        std::thread::Builder::new()
            .name("deid-transcribe".to_string())
            .spawn(move || {
                let _ = tx.send(worker.transcribe(&path));
            })
            .map_err(|e| DeidError::runtime("spawn transcription thread", e))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    audio = %audio_path.display(),
                    timeout_secs = timeout.as_secs_f64(),
                    "transcription timed out"
                );
                Err(DeidError::TranscriptionTimeout { timeout })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DeidError::transcription(
                "transcription worker exited without a result",
            )),
        }
    }
}

/// Redacted audio on disk. A scratch file is removed when dropped.
enum RedactedAudio {
    Saved(PathBuf),
    Scratch(TempPath),
}

impl RedactedAudio {
    fn path(&self) -> &Path {
        match self {
            Self::Saved(path) => path.as_path(),
            Self::Scratch(temp) => &**temp,
        }
    }
}

pub(crate) fn conversation_id_for(audio_path: &Path) -> String {
    audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| audio_path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use hound::{SampleFormat, WavSpec, WavWriter};

    use super::*;
    use crate::pipeline::builder::DeidPipelineBuilder;
    use crate::types::WordTimestamp;
    use crate::verification::VerificationStatus;

    const RATE: u32 = 16_000;

    struct FixedTranscriber(Vec<WordTimestamp>);

    impl Transcriber for FixedTranscriber {
        fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, DeidError> {
            let mut t =
                TranscriptionResult::from_words(conversation_id_for(audio_path), self.0.clone());
            t.audio_duration = 6.0;
            Ok(t)
        }
    }

    struct FailingTranscriber;

    impl Transcriber for FailingTranscriber {
        fn transcribe(&self, _audio_path: &Path) -> Result<TranscriptionResult, DeidError> {
            Err(DeidError::transcription("engine offline"))
        }
    }

    struct SlowTranscriber;

    impl Transcriber for SlowTranscriber {
        fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, DeidError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(TranscriptionResult::from_words(conversation_id_for(audio_path), Vec::new()))
        }
    }

    fn scenario_words() -> Vec<WordTimestamp> {
        vec![
            WordTimestamp::new("I", 0.0, 0.2),
            WordTimestamp::new("visited", 0.3, 0.8),
            WordTimestamp::new("Houston", 1.0, 1.5),
            WordTimestamp::new("Texas", 2.5, 3.0),
            WordTimestamp::new("on", 3.2, 3.4),
            WordTimestamp::new("Monday", 4.0, 4.5),
        ]
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("speech_deid_rt_{}_{name}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_constant_wav(path: &Path, secs: f64) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).expect("create wav");
        for _ in 0..(secs * f64::from(RATE)) as usize {
            writer.write_sample(0.3f32).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    fn config(output_dir: &Path, save: bool) -> DeidConfig {
        DeidConfig {
            output_dir: output_dir.to_path_buf(),
            save_outputs: save,
            verify_audio: false,
            ..DeidConfig::default()
        }
    }

    #[test]
    fn full_run_redacts_text_and_audio() {
        let dir = temp_dir("full");
        let audio_path = dir.join("call_a.wav");
        write_constant_wav(&audio_path, 6.0);
        let out_dir = dir.join("out");

        let pipeline = DeidPipelineBuilder::new(config(&out_dir, true))
            .with_transcriber(Box::new(FixedTranscriber(scenario_words())))
            .build()
            .expect("build pipeline");
        let output = pipeline.process_conversation(&audio_path);

        assert!(output.success, "{:?}", output.error);
        assert_eq!(output.pii_matches.len(), 3);
        assert_eq!(output.bleep_regions.len(), 3);
        let redacted = output.transcript_redacted.as_ref().expect("redacted transcript");
        assert_eq!(redacted.redacted_text, "I visited [CITY] [STATE] on [DAY]");
        let verification = output.verification.as_ref().expect("verification");
        assert_eq!(verification.overall_status, VerificationStatus::Pass);

        let written =
            audio::read_mono(&out_dir.join("audio").join("call_a.wav")).expect("read back");
        let start = (0.85 * f64::from(RATE)) as usize;
        assert!(written.samples[..start].iter().all(|&s| s == 0.3));
        assert!(written.samples[start + 400..start + 800].iter().any(|&s| s != 0.3));
        assert!(out_dir.join("transcripts_raw").join("call_a.json").exists());
        assert!(out_dir.join("transcripts_deid").join("call_a.json").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_audio_fails_at_transcription() {
        let dir = temp_dir("missing");
        let pipeline = DeidPipelineBuilder::new(config(&dir, false))
            .with_transcriber(Box::new(FixedTranscriber(scenario_words())))
            .build()
            .expect("build pipeline");
        let output = pipeline.process_conversation(&dir.join("nope.wav"));
        assert!(!output.success);
        assert_eq!(output.stage, Some(Stage::Transcription));
        assert!(output.error.as_deref().unwrap_or("").contains("input not found"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn transcription_timeout_is_a_file_failure() {
        let dir = temp_dir("timeout");
        let audio_path = dir.join("slow.wav");
        write_constant_wav(&audio_path, 0.5);
        let mut cfg = config(&dir, false);
        cfg.transcription_timeout_secs = Some(0.05);
        let pipeline = DeidPipelineBuilder::new(cfg)
            .with_transcriber(Box::new(SlowTranscriber))
            .build()
            .expect("build pipeline");
        let output = pipeline.process_conversation(&audio_path);
        assert!(!output.success);
        assert_eq!(output.stage, Some(Stage::Transcription));
        assert!(output.error.as_deref().unwrap_or("").contains("timed out"));
        assert!(output.transcript_raw.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_verification_transcription_degrades_to_review() {
        let dir = temp_dir("verify");
        let audio_path = dir.join("call_v.wav");
        write_constant_wav(&audio_path, 6.0);
        let mut cfg = config(&dir, false);
        cfg.verify_audio = true;
        let pipeline = DeidPipelineBuilder::new(cfg)
            .with_transcriber(Box::new(FixedTranscriber(scenario_words())))
            .with_verification_transcriber(Box::new(FailingTranscriber))
            .build()
            .expect("build pipeline");
        let output = pipeline.process_conversation(&audio_path);
        assert!(output.success, "{:?}", output.error);
        let verification = output.verification.expect("verification");
        assert_eq!(verification.text_status, VerificationStatus::Pass);
        assert_eq!(verification.audio_status, Some(VerificationStatus::ReviewRequired));
        assert_eq!(verification.overall_status, VerificationStatus::ReviewRequired);
        assert!(output.redacted_audio_path.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    struct RecordingTranscriber(Arc<Mutex<Vec<(PathBuf, bool)>>>);

    impl Transcriber for RecordingTranscriber {
        fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, DeidError> {
            if let Ok(mut seen) = self.0.lock() {
                seen.push((audio_path.to_path_buf(), audio_path.exists()));
            }
            Ok(TranscriptionResult::from_words("redacted", Vec::new()))
        }
    }

    #[test]
    fn scratch_audio_is_unique_and_removed() {
        let dir = temp_dir("scratch");
        let first = dir.join("a").join("call.wav");
        let second = dir.join("b").join("call.wav");
        for path in [&first, &second] {
            std::fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
            write_constant_wav(path, 6.0);
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut cfg = config(&dir, false);
        cfg.verify_audio = true;
        let pipeline = DeidPipelineBuilder::new(cfg)
            .with_transcriber(Box::new(FixedTranscriber(scenario_words())))
            .with_verification_transcriber(Box::new(RecordingTranscriber(Arc::clone(&seen))))
            .build()
            .expect("build pipeline");
        for path in [&first, &second] {
            let output = pipeline.process_conversation(path);
            assert!(output.success, "{:?}", output.error);
            assert_eq!(
                output.verification.expect("verification").audio_status,
                Some(VerificationStatus::Pass)
            );
        }

        let seen = seen.lock().expect("lock").clone();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0].0, seen[1].0);
        for (path, existed) in &seen {
            assert!(*existed, "{} missing during verification", path.display());
            assert!(!path.exists(), "{} left behind", path.display());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duration_prefers_transcript_then_audio() {
        let mut output = ConversationOutput::new("x");
        output.audio_duration_secs = Some(3.0);
        assert!((output.duration_secs() - 3.0).abs() < 1e-12);
        let mut t = TranscriptionResult::from_words("x", Vec::new());
        t.audio_duration = 4.0;
        output.transcript_raw = Some(t);
        assert!((output.duration_secs() - 4.0).abs() < 1e-12);
    }
}
