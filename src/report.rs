use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{DeidError, Stage};
use crate::pipeline::runtime::ConversationOutput;
use crate::verification::VerificationStatus;

/// Recordings in the corpus are two-party calls.
const SPEAKERS_PER_CONVERSATION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_conversations: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_duration_sec: f64,
    pub total_duration_min: f64,
    pub total_pii_redacted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEntry {
    pub conversation_id: String,
    pub stage: Option<Stage>,
    pub error: String,
}

/// Batch-level QA report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingReport {
    pub timestamp: String,
    pub summary: ReportSummary,
    pub verification_status: BTreeMap<&'static str, usize>,
    pub failures: Vec<FailureEntry>,
    pub processing_times: BTreeMap<String, f64>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl ProcessingReport {
    pub fn from_outputs(outputs: &[ConversationOutput], generated_at: DateTime<Local>) -> Self {
        let (successes, failures): (Vec<&ConversationOutput>, Vec<&ConversationOutput>) =
            outputs.iter().partition(|o| o.success);

        let mut verification_status: BTreeMap<&'static str, usize> = VerificationStatus::ALL
            .iter()
            .map(|s| (s.as_str(), 0))
            .collect();
        for output in &successes {
            if let Some(verification) = &output.verification {
                *verification_status
                    .entry(verification.overall_status.as_str())
                    .or_default() += 1;
            }
        }

        // First output per id wins; later ones are rejected duplicates.
        let mut processing_times = BTreeMap::new();
        for output in outputs {
            processing_times
                .entry(output.conversation_id.clone())
                .or_insert(output.processing_time_secs);
        }

        let total_duration: f64 = successes.iter().map(|o| o.duration_secs()).sum();
        let total_pii_redacted = successes.iter().map(|o| o.pii_matches.len()).sum();

        Self {
            timestamp: generated_at.to_rfc3339(),
            summary: ReportSummary {
                total_conversations: outputs.len(),
                successful: successes.len(),
                failed: failures.len(),
                total_duration_sec: round1(total_duration),
                total_duration_min: round1(total_duration / 60.0),
                total_pii_redacted,
            },
            verification_status,
            failures: failures
                .iter()
                .map(|o| FailureEntry {
                    conversation_id: o.conversation_id.clone(),
                    stage: o.stage,
                    error: o.error.clone().unwrap_or_default(),
                })
                .collect(),
            processing_times,
        }
    }
}

/// One metadata row per successfully processed recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestRow {
    pub conversation_id: String,
    pub duration_sec: f64,
    pub num_speakers: u32,
    pub sample_rate: u32,
    pub has_pii: bool,
    pub pii_count: usize,
    pub deid_version: String,
    pub qa_status: String,
}

pub fn deid_version(generated_at: DateTime<Local>) -> String {
    generated_at.format("%Y-%m-%d_v1").to_string()
}

pub fn build_manifest(outputs: &[ConversationOutput], deid_version: &str) -> Vec<ManifestRow> {
    outputs
        .iter()
        .filter(|o| o.success)
        .map(|o| ManifestRow {
            conversation_id: o.conversation_id.clone(),
            duration_sec: o.duration_secs(),
            num_speakers: SPEAKERS_PER_CONVERSATION,
            sample_rate: o.sample_rate_hz.unwrap_or_default(),
            has_pii: !o.pii_matches.is_empty(),
            pii_count: o.pii_matches.len(),
            deid_version: deid_version.to_string(),
            qa_status: o
                .verification
                .as_ref()
                .map_or("pending", |v| v.overall_status.as_str())
                .to_string(),
        })
        .collect()
}

/// Pretty-printed JSON with a trailing newline; parent directories are created.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DeidError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DeidError::io("create output directory", e))?;
    }
    let file = File::create(path).map_err(|e| DeidError::io("create JSON artifact", e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| DeidError::json("serialize JSON artifact", e))?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| DeidError::io("finalize JSON artifact", e))
}
