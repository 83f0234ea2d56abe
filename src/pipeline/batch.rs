use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::Local;
use rayon::prelude::*;

use crate::error::DeidError;
use crate::pipeline::runtime::{conversation_id_for, ConversationOutput, DeidPipeline};
use crate::report::{self, ManifestRow, ProcessingReport};

/// Result of a batch run. Per-file failures live in `outputs` and the report;
/// they never abort the batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub outputs: Vec<ConversationOutput>,
    pub report: ProcessingReport,
    pub manifest: Vec<ManifestRow>,
}

impl DeidPipeline {
    pub fn process_batch(&self, audio_paths: &[PathBuf]) -> Result<BatchOutcome, DeidError> {
        self.process_batch_with_progress(audio_paths, |_| {})
    }

    /// Processes recordings in parallel on a pool of `config.workers` threads,
    /// calling `on_done` as each one finishes. Outputs keep input order.
    pub fn process_batch_with_progress<F>(
        &self,
        audio_paths: &[PathBuf],
        on_done: F,
    ) -> Result<BatchOutcome, DeidError>
    where
        F: Fn(&ConversationOutput) + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config().workers)
            .thread_name(|i| format!("deid-worker-{i}"))
            .build()
            .map_err(|e| DeidError::runtime("build worker pool", e))?;

        tracing::info!(
            conversations = audio_paths.len(),
            workers = pool.current_num_threads(),
            "processing batch"
        );

        let claimed_by = earlier_owners(audio_paths);
        let outputs: Vec<ConversationOutput> = pool.install(|| {
            audio_paths
                .par_iter()
                .zip(claimed_by.par_iter())
                .map(|(path, owner)| {
                    let output = match owner {
                        Some(owner) => duplicate_failure(path, owner),
                        None => self.process_isolated(path),
                    };
                    on_done(&output);
                    output
                })
                .collect()
        });

        let generated_at = Local::now();
        let report = ProcessingReport::from_outputs(&outputs, generated_at);
        let manifest = report::build_manifest(&outputs, &report::deid_version(generated_at));

        if self.config().save_outputs {
            let out = &self.config().output_dir;
            let report_path = out.join("qa").join("processing_report.json");
            report::write_json(&report_path, &report)?;
            report::write_json(&out.join("metadata").join("manifest.json"), &manifest)?;
            tracing::info!(report = %report_path.display(), "batch artifacts written");
        }

        tracing::info!(
            total = report.summary.total_conversations,
            successful = report.summary.successful,
            failed = report.summary.failed,
            pii_redacted = report.summary.total_pii_redacted,
            "batch complete"
        );

        Ok(BatchOutcome {
            outputs,
            report,
            manifest,
        })
    }

    /// A panic inside one conversation becomes that conversation's failure.
    fn process_isolated(&self, audio_path: &Path) -> ConversationOutput {
        panic::catch_unwind(AssertUnwindSafe(|| self.process_conversation(audio_path)))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(audio = %audio_path.display(), error = %message, "conversation panicked");
                let mut output = ConversationOutput::new(conversation_id_for(audio_path));
                output.error = Some(message);
                output
            })
    }
}

/// For each path, the earlier path that already owns its conversation id.
/// Artifacts are named by id, so only the first recording with a given id runs.
fn earlier_owners(audio_paths: &[PathBuf]) -> Vec<Option<&Path>> {
    let mut owners: HashMap<String, &Path> = HashMap::new();
    audio_paths
        .iter()
        .map(|path| match owners.entry(conversation_id_for(path)) {
            Entry::Occupied(owner) => Some(*owner.get()),
            Entry::Vacant(slot) => {
                slot.insert(path);
                None
            }
        })
        .collect()
}

fn duplicate_failure(audio_path: &Path, owner: &Path) -> ConversationOutput {
    let mut output = ConversationOutput::new(conversation_id_for(audio_path));
    let err = DeidError::invalid_input(format!(
        "conversation id '{}' of {} is already taken by {}",
        output.conversation_id,
        audio_path.display(),
        owner.display()
    ));
    tracing::error!(audio = %audio_path.display(), error = %err, "duplicate conversation id");
    output.error = Some(err.to_string());
    output
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::DeidConfig;
    use crate::error::Stage;
    use crate::pipeline::builder::DeidPipelineBuilder;
    use crate::pipeline::traits::Transcriber;
    use crate::types::{TranscriptionResult, WordTimestamp};
    use crate::verification::VerificationStatus;

    struct ScriptedTranscriber;

    impl Transcriber for ScriptedTranscriber {
        fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, DeidError> {
            let id = conversation_id_for(audio_path);
            if id.starts_with("panic") {
                panic!("engine crashed on {id}");
            }
            if id.starts_with("broken") {
                return Err(DeidError::transcription("decoder error"));
            }
            let mut t = TranscriptionResult::from_words(
                id,
                vec![
                    WordTimestamp::new("see", 0.1, 0.3),
                    WordTimestamp::new("you", 0.4, 0.6),
                    WordTimestamp::new("Friday", 0.7, 1.1),
                ],
            );
            t.audio_duration = 2.0;
            Ok(t)
        }
    }

    fn write_silence(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for _ in 0..16_000 {
            writer.write_sample(0i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn failures_are_isolated_and_reported() {
        let dir = std::env::temp_dir().join(format!("speech_deid_batch_{}", std::process::id()));
        let input = dir.join("in");
        std::fs::create_dir_all(&input).expect("create input dir");
        let mut paths = Vec::new();
        for name in ["ok_1", "broken_2", "panic_3", "ok_4"] {
            let path = input.join(format!("{name}.wav"));
            write_silence(&path);
            paths.push(path);
        }
        paths.push(input.join("missing_5.wav"));

        let config = DeidConfig {
            output_dir: dir.join("out"),
            verify_audio: false,
            workers: 2,
            ..DeidConfig::default()
        };
        let pipeline = DeidPipelineBuilder::new(config)
            .with_transcriber(Box::new(ScriptedTranscriber))
            .build()
            .expect("build pipeline");

        let finished = AtomicUsize::new(0);
        let outcome = pipeline
            .process_batch_with_progress(&paths, |_| {
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .expect("batch");

        assert_eq!(finished.load(Ordering::SeqCst), 5);
        let ids: Vec<&str> = outcome.outputs.iter().map(|o| o.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["ok_1", "broken_2", "panic_3", "ok_4", "missing_5"]);

        assert_eq!(outcome.report.summary.successful, 2);
        assert_eq!(outcome.report.summary.failed, 3);
        assert_eq!(outcome.report.summary.total_pii_redacted, 2);
        assert_eq!(outcome.report.verification_status["PASS"], 2);
        assert_eq!(outcome.outputs[1].stage, Some(Stage::Transcription));
        assert!(outcome.outputs[2].error.as_deref().unwrap_or("").contains("engine crashed"));

        assert_eq!(outcome.manifest.len(), 2);
        assert_eq!(outcome.manifest[0].sample_rate, 8_000);
        assert_eq!(outcome.manifest[0].qa_status, VerificationStatus::Pass.as_str());

        let out = dir.join("out");
        assert!(out.join("qa").join("processing_report.json").exists());
        assert!(out.join("metadata").join("manifest.json").exists());
        assert!(out.join("audio").join("ok_4.wav").exists());
        assert!(!out.join("audio").join("broken_2.wav").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplicate_conversation_ids_run_once() {
        let dir = std::env::temp_dir().join(format!("speech_deid_dupes_{}", std::process::id()));
        let mut paths = Vec::new();
        for sub in ["a", "b"] {
            let folder = dir.join(sub);
            std::fs::create_dir_all(&folder).expect("create input dir");
            let path = folder.join("call.wav");
            write_silence(&path);
            paths.push(path);
        }

        let config = DeidConfig {
            save_outputs: false,
            verify_audio: false,
            workers: 2,
            ..DeidConfig::default()
        };
        let pipeline = DeidPipelineBuilder::new(config)
            .with_transcriber(Box::new(ScriptedTranscriber))
            .build()
            .expect("build pipeline");
        let outcome = pipeline.process_batch(&paths).expect("batch");

        assert!(outcome.outputs[0].success);
        assert!(!outcome.outputs[1].success);
        let error = outcome.outputs[1].error.as_deref().unwrap_or("");
        assert!(error.contains("already taken"), "{error}");
        assert_eq!(outcome.report.summary.failed, 1);
        assert_eq!(outcome.report.processing_times.len(), 1);
        assert!(outcome.report.processing_times["call"] > 0.0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
