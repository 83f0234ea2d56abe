use std::path::Path;

use crate::error::DeidError;
use crate::types::{PiiMatch, TextFinding, TranscriptionResult, WordTimestamp};

/// External speech-to-text engine. Must return word-level timestamps in
/// seconds, non-decreasing across the recording.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, DeidError>;

    /// Whether the transcript is derived from the audio at `audio_path`. Sources
    /// that look transcripts up by name return `false` and cannot stand in for
    /// re-transcription of redacted audio.
    fn listens_to_audio(&self) -> bool {
        true
    }
}

pub trait PiiDetector: Send + Sync {
    /// Non-overlapping spans over `words`, sorted by start time.
    fn detect(&self, words: &[WordTimestamp]) -> Vec<PiiMatch>;

    fn detect_in_text(&self, text: &str) -> Vec<TextFinding>;
}
