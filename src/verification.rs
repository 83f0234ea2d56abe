//! Closed-loop check that redaction removed every PII occurrence.
//!
//! The redacted text is rescanned and, when available, a re-transcription of
//! the redacted audio is run through the full span matcher. Each check is
//! reduced to a [`VerificationStatus`]; the overall status is the worse one.

use std::fmt;

use serde::Serialize;

use crate::config::VerifierConfig;
use crate::error::DeidError;
use crate::pipeline::traits::PiiDetector;
use crate::redaction::RedactedTranscript;
use crate::types::{PiiMatch, TextFinding, TranscriptionResult};

/// Residual-risk classification, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pass,
    PassWithNote,
    ReviewRequired,
    Fail,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 4] = [
        VerificationStatus::Pass,
        VerificationStatus::PassWithNote,
        VerificationStatus::ReviewRequired,
        VerificationStatus::Fail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::PassWithNote => "PASS_WITH_NOTE",
            Self::ReviewRequired => "REVIEW_REQUIRED",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum CheckSource {
    Text,
    Audio,
}

impl CheckSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Audio => "Audio",
        }
    }
}

/// Outcome of one check: its status, the residual findings and any notes.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome<F> {
    pub status: VerificationStatus,
    pub findings: Vec<F>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub conversation_id: String,
    pub overall_status: VerificationStatus,
    pub text_status: VerificationStatus,
    /// `None` when audio verification was not requested.
    pub audio_status: Option<VerificationStatus>,
    #[serde(rename = "text_pii_found")]
    pub text_findings: Vec<TextFinding>,
    #[serde(rename = "audio_pii_found")]
    pub audio_findings: Vec<PiiMatch>,
    pub notes: Vec<String>,
}

impl VerificationResult {
    pub fn new(
        conversation_id: impl Into<String>,
        text: CheckOutcome<TextFinding>,
        audio: Option<CheckOutcome<PiiMatch>>,
    ) -> Self {
        let mut notes = text.notes;
        let (audio_status, audio_findings) = match audio {
            Some(audio) => {
                notes.extend(audio.notes);
                (Some(audio.status), audio.findings)
            }
            None => (None, Vec::new()),
        };
        Self {
            conversation_id: conversation_id.into(),
            overall_status: audio_status.map_or(text.status, |a| a.max(text.status)),
            text_status: text.status,
            audio_status,
            text_findings: text.findings,
            audio_findings,
            notes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Maps a residual finding count to a status. `high_confidence` is the
    /// number of findings at or above the high-confidence threshold.
    pub fn determine_status(&self, count: usize, high_confidence: usize) -> VerificationStatus {
        if count == 0 {
            VerificationStatus::Pass
        } else if count <= self.config.review_threshold {
            if high_confidence == 0 {
                VerificationStatus::PassWithNote
            } else {
                VerificationStatus::ReviewRequired
            }
        } else {
            VerificationStatus::Fail
        }
    }

    fn classify(&self, source: CheckSource, confidences: &[f32]) -> (VerificationStatus, Vec<String>) {
        let count = confidences.len();
        let high_confidence = confidences
            .iter()
            .filter(|&&c| c >= self.config.high_confidence_threshold)
            .count();
        let status = self.determine_status(count, high_confidence);
        let source = source.as_str();
        let note = match status {
            VerificationStatus::Pass => None,
            VerificationStatus::PassWithNote => Some(format!(
                "{source}: {count} low-confidence match(es), likely ASR noise or false positive"
            )),
            VerificationStatus::ReviewRequired => Some(format!(
                "{source}: {count} PII match(es) found, manual review recommended"
            )),
            VerificationStatus::Fail => Some(format!(
                "{source}: {count} PII instances leaked - check bleep alignment"
            )),
        };
        (status, note.into_iter().collect())
    }

    /// Rescans the redacted text, ignoring the labels redaction inserted.
    pub fn verify_text(
        &self,
        redacted: &RedactedTranscript,
        detector: &dyn PiiDetector,
    ) -> CheckOutcome<TextFinding> {
        let findings: Vec<TextFinding> = detector
            .detect_in_text(&redacted.redacted_text)
            .into_iter()
            .filter(|f| !is_redaction_label(&f.text))
            .collect();
        let confidences: Vec<f32> = findings.iter().map(|f| f.confidence).collect();
        let (status, notes) = self.classify(CheckSource::Text, &confidences);

        tracing::info!(
            conversation_id = %redacted.conversation_id,
            status = %status,
            findings = findings.len(),
            "text verification"
        );
        CheckOutcome {
            status,
            findings,
            notes,
        }
    }

    /// Runs the span matcher over a re-transcription of the redacted audio.
    /// A failed re-transcription is not fatal; it asks for manual review.
    pub fn verify_audio(
        &self,
        retranscription: Result<TranscriptionResult, DeidError>,
        detector: &dyn PiiDetector,
    ) -> CheckOutcome<PiiMatch> {
        let transcript = match retranscription {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::warn!(error = %e, "audio verification could not re-transcribe");
                return CheckOutcome {
                    status: VerificationStatus::ReviewRequired,
                    findings: Vec::new(),
                    notes: vec![format!("Audio verification failed: {e}")],
                };
            }
        };

        let findings = detector.detect(&transcript.all_words());
        let confidences: Vec<f32> = findings.iter().map(|m| m.confidence).collect();
        let (status, notes) = self.classify(CheckSource::Audio, &confidences);

        tracing::info!(
            conversation_id = %transcript.conversation_id,
            status = %status,
            findings = findings.len(),
            "audio verification"
        );
        CheckOutcome {
            status,
            findings,
            notes,
        }
    }

    pub fn verify(
        &self,
        redacted: &RedactedTranscript,
        detector: &dyn PiiDetector,
        retranscription: Option<Result<TranscriptionResult, DeidError>>,
    ) -> VerificationResult {
        let text = self.verify_text(redacted, detector);
        let audio = retranscription.map(|r| self.verify_audio(r, detector));
        VerificationResult::new(redacted.conversation_id.clone(), text, audio)
    }
}

fn is_redaction_label(text: &str) -> bool {
    text.starts_with('[') && text.ends_with(']')
}
